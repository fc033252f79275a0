//! Built-in canonical name tables.
//!
//! Variants are listed as they appear in the spreadsheet; they are converted
//! to key form when the mapping is built. Rule needles are already in key
//! form (uppercase, no accents).

use super::rules::{HeuristicRule, Predicate::*};
use super::CanonicalMapping;

const ORIGIN_EXACT: &[(&str, &str)] = &[
    ("ADUFERTIL JUNDIAI", "ADUFERTIL JUNDIAI/SP"),
    ("ADUFERTIL JUNDIAI SP", "ADUFERTIL JUNDIAI/SP"),
    ("ADUFERTIL - JUNDIAI/SP", "ADUFERTIL JUNDIAI/SP"),
    ("ELEKEIROZ", "ELEKEIROZ VARZEA/SP"),
    ("ELEKEIROZ/VARZEA-SP", "ELEKEIROZ VARZEA/SP"),
    ("ELEKEIROZ VARZEA PAULISTA", "ELEKEIROZ VARZEA/SP"),
    ("MOSAIC CUBATAO", "MOSAIC CUBATAO/SP"),
    ("MOSAIC - CUBATAO/SP", "MOSAIC CUBATAO/SP"),
    ("MOSAIC UBERABA", "MOSAIC UBERABA/MG"),
    ("MOSAIC - UBERABA/MG", "MOSAIC UBERABA/MG"),
    ("CSRD CUBATÃO/SP", "CSRD"),
    ("K + S", "K+S"),
    ("K+S BRASIL", "K+S"),
];

/// Origin-client rules, in priority order.
fn origin_rules() -> Vec<HeuristicRule> {
    vec![
        HeuristicRule::new(
            "elekeiroz",
            ContainsAny(&["ELEKEIROZ", "ELEIKEIROZ", "ELEQUEIROZ", "ELEQUEIOZ", "ELKEIROZ"]),
            "ELEKEIROZ VARZEA/SP",
        ),
        HeuristicRule::new(
            "adufertil",
            ContainsAny(&["ADUFERTIL", "ADULFERTIL", "ADUFETIL", "ADUFERIL"]),
            "ADUFERTIL JUNDIAI/SP",
        ),
        HeuristicRule::new(
            "mosaic-cubatao",
            All(vec![Contains("MOSAIC"), Contains("CUBATAO")]),
            "MOSAIC CUBATAO/SP",
        ),
        HeuristicRule::new(
            "mosaic-uberaba",
            All(vec![Contains("MOSAIC"), ContainsAny(&["UBERABA", "UBERADA"])]),
            "MOSAIC UBERABA/MG",
        ),
        HeuristicRule::new("mosaic-bare", Equals("MOSAIC"), "MOSAIC CUBATAO/SP"),
        HeuristicRule::new("csrd", Contains("CSRD"), "CSRD"),
        HeuristicRule::new("jbs", Contains("JBS"), "JBS"),
        HeuristicRule::new("k+s", Contains("K+S"), "K+S"),
        HeuristicRule::new("nitex", Contains("NITEX"), "NITEX"),
        HeuristicRule::new("quimivita", Contains("QUIMIVITA"), "QUIMIVITA"),
        HeuristicRule::new(
            "safra-alfenas",
            All(vec![Contains("SAFRA"), Contains("ALFENAS")]),
            "SAFRA ALFENAS/MG",
        ),
        HeuristicRule::new("safra-bare", Equals("SAFRA"), "SAFRA ALFENAS/MG"),
    ]
}

const DESTINATION_EXACT: &[(&str, &str)] = &[
    ("ADUBOS ANAPOLIS", "ADUBOS ARAGUAIA ANAPOLIS"),
    ("ADUBOS ARAG.ANAPOLIS/GO", "ADUBOS ARAGUAIA ANAPOLIS"),
    ("ADUBOS ARAG. ANAPOLIS /GO", "ADUBOS ARAGUAIA ANAPOLIS"),
    ("ADUBOS ARAG. ANAPOLIS/GO", "ADUBOS ARAGUAIA ANAPOLIS"),
    ("ADUBOS ARAG. CATALAO/GO", "ADUBOS ARAGUAIA CATALÃO"),
    ("ADUBOS ARAG. CATALÃO/GO", "ADUBOS ARAGUAIA CATALÃO"),
    ("ADUBOS ARAG - CATALAO/GO", "ADUBOS ARAGUAIA CATALÃO"),
    ("ADUBOS ARAGUAIA CATALAO/GO", "ADUBOS ARAGUAIA CATALÃO"),
    ("ADUFERTIL ALFENAS/MG", "ADUFERTIL ALFENAS"),
    ("ADULFERTIL ALFENAS/MG", "ADUFERTIL ALFENAS"),
    ("COFCO - CATANDUVA/SP", "COFCO CATANDUVA"),
    ("COFCO - MERIDIANO/SP", "COFCO MERIDIANO"),
    ("COFCO - POTIRENDABA/SP", "COFCO POTIRENDABA"),
    ("COFCO - SEBASTIANOPOLIS", "COFCO SEBASTIANÓPOLIS"),
    ("COFCO - SEBASTIANOPOLIS/SP", "COFCO SEBASTIANÓPOLIS"),
    ("FASS - NOVA INDEPENDENCIA", "FASS NOVA INDEPENDÊNCIA"),
    ("FASS - NOVA INDEPENDENCIA/SP", "FASS NOVA INDEPENDÊNCIA"),
    ("FASS NOVA INDEPENDENCIA/SP", "FASS NOVA INDEPENDÊNCIA"),
    ("FASS - SERTAOZINHO", "FASS SERTÃOZINHO"),
    ("FASS - SERTAOZINHO/SP", "FASS SERTÃOZINHO"),
    ("FASS - SERTÃOZINHO/SP", "FASS SERTÃOZINHO"),
    ("ICL JACAREI/SP", "ICL JACAREÍ"),
    ("ICL JACAREI/SP - 0008/99", "ICL JACAREÍ"),
    ("ICL JACAREI/SP - 0013/56", "ICL JACAREÍ"),
    ("ICL UBERLANDIA/MG", "ICL UBERLÂNDIA"),
    ("LOYDER - OLIMPIA/SP", "LOYDER OLIMPIA"),
    ("LOYDER OLIMPIA/SP", "LOYDER OLIMPIA"),
    ("SAFRA ALFENAS/MG", "SAFRA ALFENAS"),
    ("SAFRA IND ALFENAS", "SAFRA ALFENAS"),
    ("SAFRA IND. ALFENAS", "SAFRA ALFENAS"),
    ("SAFRA IND. FERLT/ALFENAS", "SAFRA ALFENAS"),
    ("SAFRA IND. FERTL ALFENAS/MG", "SAFRA ALFENAS"),
    ("SAFRA IND. FERTL/ALFENAS", "SAFRA ALFENAS"),
    ("SAFRA IND.FERTL/ALFENAS", "SAFRA ALFENAS"),
    ("USINA SANTA ADELIA S/A", "USINA SANTA ADÉLIA"),
    ("USINA SAO MANOEL /SP", "USINA SÃO MANOEL"),
    ("USINA SAO MANOEL/SP", "USINA SÃO MANOEL"),
    ("USINA SAO MANUEL/SP", "USINA SÃO MANOEL"),
    ("BONFINOPOLIS/MG", "BONFINOPOLIS/MG"),
    ("CAFE BRASIL/MG", "CAFE BRASIL/MG"),
    ("FERTIBOM/CATANDUVA", "FERTIBOM/CATANDUVA"),
    ("KALIUM", "KALIUM"),
    ("TERA FERTILIZANTES/MG", "TERA FERTILIZANTES/MG"),
];

/// Destination-client rules, in priority order.
fn destination_rules() -> Vec<HeuristicRule> {
    vec![
        HeuristicRule::new(
            "adubos-anapolis",
            All(vec![Contains("ADUBOS"), ContainsAny(&["ARAG", "ANAPOLIS"])]),
            "ADUBOS ARAGUAIA ANAPOLIS",
        ),
        HeuristicRule::new(
            "adubos-catalao",
            All(vec![Contains("ADUBOS"), Contains("CATALAO")]),
            "ADUBOS ARAGUAIA CATALÃO",
        ),
        HeuristicRule::new(
            "adufertil-alfenas",
            All(vec![ContainsAny(&["ADUFERTIL", "ADULFERTIL"]), Contains("ALFENAS")]),
            "ADUFERTIL ALFENAS",
        ),
        HeuristicRule::new(
            "cofco-catanduva",
            All(vec![Contains("COFCO"), Contains("CATANDUVA")]),
            "COFCO CATANDUVA",
        ),
        HeuristicRule::new(
            "cofco-meridiano",
            All(vec![Contains("COFCO"), Contains("MERIDIANO")]),
            "COFCO MERIDIANO",
        ),
        HeuristicRule::new(
            "cofco-potirendaba",
            All(vec![Contains("COFCO"), Contains("POTIRENDA")]),
            "COFCO POTIRENDABA",
        ),
        HeuristicRule::new(
            "cofco-sebastianopolis",
            All(vec![Contains("COFCO"), Contains("SEBASTIANOPOLIS")]),
            "COFCO SEBASTIANÓPOLIS",
        ),
        HeuristicRule::new(
            "fass-nova-independencia",
            All(vec![
                Contains("FASS"),
                ContainsAny(&["NOVA IND", "INDEPENDENC", "N.INDEPEND"]),
            ]),
            "FASS NOVA INDEPENDÊNCIA",
        ),
        HeuristicRule::new(
            "fass-sertaozinho",
            All(vec![Contains("FASS"), Contains("SERTAOZINHO")]),
            "FASS SERTÃOZINHO",
        ),
        HeuristicRule::new(
            "icl-jacarei",
            All(vec![Contains("ICL"), Contains("JACAREI")]),
            "ICL JACAREÍ",
        ),
        HeuristicRule::new(
            "icl-uberlandia",
            All(vec![Contains("ICL"), Contains("UBERLANDIA")]),
            "ICL UBERLÂNDIA",
        ),
        HeuristicRule::new(
            "loyder-olimpia",
            All(vec![Contains("LOYDER"), Contains("OLIMPIA")]),
            "LOYDER OLIMPIA",
        ),
        HeuristicRule::new(
            "safra-alfenas",
            All(vec![Contains("SAFRA"), Contains("ALFENAS")]),
            "SAFRA ALFENAS",
        ),
        HeuristicRule::new("safra-bare", Equals("SAFRA"), "SAFRA ALFENAS"),
        HeuristicRule::new(
            "usina-santa-adelia",
            All(vec![Contains("USINA"), Contains("SANTA ADEL")]),
            "USINA SANTA ADÉLIA",
        ),
        HeuristicRule::new(
            "usina-sao-manoel",
            All(vec![Contains("USINA"), ContainsAny(&["SAO MANOEL", "SAO MANUEL"])]),
            "USINA SÃO MANOEL",
        ),
    ]
}

pub fn origin_mapping() -> CanonicalMapping {
    CanonicalMapping::new(ORIGIN_EXACT.iter().copied(), origin_rules())
}

pub fn destination_mapping() -> CanonicalMapping {
    CanonicalMapping::new(DESTINATION_EXACT.iter().copied(), destination_rules())
}
