//! Client-name normalization.
//!
//! Free-text client names are collapsed onto canonical spellings in two
//! independent domains (origin client and sale/destination client):
//!
//! 1. blank or missing → [`NOT_INFORMED`]
//! 2. uppercase, trim, strip accents → key
//! 3. exact lookup of the key
//! 4. ordered heuristic rules, first match wins
//! 5. otherwise a cleaned copy of the key (a fall-through)

pub mod mapping_file;
pub mod rules;
pub mod tables;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, collections::HashMap, fmt};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

pub use rules::{HeuristicRule, Predicate};

/// Substituted for blank names so grouping stays total.
pub const NOT_INFORMED: &str = "NOT INFORMED";

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Client the cargo comes from (`CLIENTE`).
    Origin,
    /// Client the cargo is sold to (`CLIENTE DE VENDA`).
    Destination,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Origin, Domain::Destination];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Origin => "origin",
            Domain::Destination => "destination",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace each accented letter by its unaccented base letter.
pub fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lookup form of a raw name: trimmed, uppercased, accents stripped.
pub fn name_key(raw: &str) -> String {
    strip_accents(&raw.trim().to_uppercase())
}

/// Best-effort cleanup for names no rule recognizes.
pub fn fallthrough_cleanup(key: &str) -> String {
    RE_WHITESPACE
        .replace_all(&key.replace('-', "/"), " ")
        .trim()
        .to_string()
}

/// Exact table plus ordered heuristic rules for one domain.
#[derive(Debug, Clone, Default)]
pub struct CanonicalMapping {
    exact: HashMap<String, String>,
    rules: Vec<HeuristicRule>,
}

impl CanonicalMapping {
    /// Keys are stored in [`name_key`] form. Every canonical output also
    /// becomes a key of itself unless the table already defines that key.
    pub fn new<'a>(
        exact: impl IntoIterator<Item = (&'a str, &'a str)>,
        rules: Vec<HeuristicRule>,
    ) -> Self {
        let mut mapping = Self {
            exact: HashMap::new(),
            rules,
        };
        mapping.extend_exact(exact.into_iter().map(|(k, v)| (k.to_string(), v.to_string())));
        let rule_outputs: Vec<String> =
            mapping.rules.iter().map(|r| r.canonical.to_string()).collect();
        for canonical in rule_outputs {
            mapping.register_self_key(&canonical);
        }
        mapping
    }

    /// Add or override exact entries.
    pub fn extend_exact(&mut self, entries: impl IntoIterator<Item = (String, String)>) {
        let mut canonicals = Vec::new();
        for (variant, canonical) in entries {
            let canonical = canonical.trim().to_string();
            self.exact.insert(name_key(&variant), canonical.clone());
            canonicals.push(canonical);
        }
        for canonical in canonicals {
            self.register_self_key(&canonical);
        }
    }

    fn register_self_key(&mut self, canonical: &str) {
        self.exact
            .entry(name_key(canonical))
            .or_insert_with(|| canonical.to_string());
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.exact.get(key).map(String::as_str)
    }

    pub fn rules(&self) -> &[HeuristicRule] {
        &self.rules
    }

    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }

    pub fn exact_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.exact.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Every distinct canonical output of this mapping.
    pub fn canonical_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .exact
            .values()
            .map(String::as_str)
            .chain(self.rules.iter().map(|r| r.canonical))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// How a name was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Sentinel,
    Exact,
    Rule(&'static str),
    Fallthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub canonical: String,
    pub via: MatchKind,
}

/// Pure function of (domain, raw value) over the two mappings it holds.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    origin: CanonicalMapping,
    destination: CanonicalMapping,
}

impl NameNormalizer {
    pub fn new(origin: CanonicalMapping, destination: CanonicalMapping) -> Self {
        Self { origin, destination }
    }

    /// The built-in tables for both domains.
    pub fn builtin() -> Self {
        Self::new(tables::origin_mapping(), tables::destination_mapping())
    }

    pub fn mapping(&self, domain: Domain) -> &CanonicalMapping {
        match domain {
            Domain::Origin => &self.origin,
            Domain::Destination => &self.destination,
        }
    }

    pub fn mapping_mut(&mut self, domain: Domain) -> &mut CanonicalMapping {
        match domain {
            Domain::Origin => &mut self.origin,
            Domain::Destination => &mut self.destination,
        }
    }

    pub fn resolve(&self, domain: Domain, raw: Option<&str>) -> Resolution {
        // blank, or nothing left once accents are stripped
        let key = raw.map(name_key).unwrap_or_default();
        if key.trim().is_empty() {
            return Resolution {
                canonical: NOT_INFORMED.to_string(),
                via: MatchKind::Sentinel,
            };
        }

        let mapping = self.mapping(domain);

        if let Some(canonical) = mapping.lookup(&key) {
            return Resolution {
                canonical: canonical.to_string(),
                via: MatchKind::Exact,
            };
        }
        if let Some(rule) = rules::first_match(mapping.rules(), &key) {
            return Resolution {
                canonical: rule.canonical.to_string(),
                via: MatchKind::Rule(rule.name),
            };
        }
        Resolution {
            canonical: fallthrough_cleanup(&key),
            via: MatchKind::Fallthrough,
        }
    }

    pub fn normalize(&self, domain: Domain, raw: Option<&str>) -> String {
        self.resolve(domain, raw).canonical
    }
}

/// Per-domain tally of how names were resolved during one reprocessing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainReport {
    pub exact: usize,
    pub rule: usize,
    pub sentinel: usize,
    /// Cleaned-but-unmapped names and how often each occurred.
    pub fallthrough: BTreeMap<String, usize>,
}

impl DomainReport {
    pub fn record(&mut self, resolution: &Resolution) {
        match resolution.via {
            MatchKind::Exact => self.exact += 1,
            MatchKind::Rule(_) => self.rule += 1,
            MatchKind::Sentinel => self.sentinel += 1,
            MatchKind::Fallthrough => {
                *self
                    .fallthrough
                    .entry(resolution.canonical.clone())
                    .or_insert(0) += 1
            }
        }
    }

    pub fn fallthrough_total(&self) -> usize {
        self.fallthrough.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub origin: DomainReport,
    pub destination: DomainReport,
}

impl NormalizationReport {
    pub fn domain(&self, domain: Domain) -> &DomainReport {
        match domain {
            Domain::Origin => &self.origin,
            Domain::Destination => &self.destination,
        }
    }

    pub fn domain_mut(&mut self, domain: Domain) -> &mut DomainReport {
        match domain {
            Domain::Origin => &mut self.origin,
            Domain::Destination => &mut self.destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_sentinel() {
        let n = NameNormalizer::builtin();
        for domain in Domain::ALL {
            assert_eq!(n.normalize(domain, None), NOT_INFORMED);
            assert_eq!(n.normalize(domain, Some("")), NOT_INFORMED);
            assert_eq!(n.normalize(domain, Some("   ")), NOT_INFORMED);
            assert_eq!(n.resolve(domain, None).via, MatchKind::Sentinel);
        }
    }

    #[test]
    fn test_combining_marks_only_is_sentinel() {
        let n = NameNormalizer::builtin();
        for domain in Domain::ALL {
            let r = n.resolve(domain, Some("\u{0301}"));
            assert_eq!(r.canonical, NOT_INFORMED);
            assert_eq!(r.via, MatchKind::Sentinel);
            assert_eq!(n.normalize(domain, Some(" \u{0301}\u{0327} ")), NOT_INFORMED);
        }
    }

    #[test]
    fn test_exact_ignores_case_and_padding() {
        let n = NameNormalizer::builtin();
        let r = n.resolve(Domain::Destination, Some("  safra alfenas/mg "));
        assert_eq!(r.canonical, "SAFRA ALFENAS");
        assert_eq!(r.via, MatchKind::Exact);
    }

    #[test]
    fn test_every_exact_key_maps_to_its_value() {
        let n = NameNormalizer::builtin();
        for domain in Domain::ALL {
            for (key, canonical) in n.mapping(domain).exact_entries() {
                assert_eq!(n.normalize(domain, Some(key)), canonical, "{} key {}", domain, key);
                let padded = format!("  {}  ", key.to_lowercase());
                assert_eq!(n.normalize(domain, Some(&padded)), canonical, "{} key {}", domain, key);
            }
        }
    }

    #[test]
    fn test_canonical_values_are_fixed_points() {
        let n = NameNormalizer::builtin();
        for domain in Domain::ALL {
            for canonical in n.mapping(domain).canonical_names() {
                let once = n.normalize(domain, Some(canonical));
                assert_eq!(once, canonical, "{}", domain);
                assert_eq!(n.normalize(domain, Some(&once)), once);
            }
        }
    }

    #[test]
    fn test_origin_typo_goes_through_rule() {
        let n = NameNormalizer::builtin();
        let r = n.resolve(Domain::Origin, Some("ELEIKEIROZ/ VARZEA-SP"));
        assert_eq!(r.canonical, "ELEKEIROZ VARZEA/SP");
        assert_eq!(r.via, MatchKind::Rule("elekeiroz"));
    }

    #[test]
    fn test_bare_safra_uses_token_rule() {
        let n = NameNormalizer::builtin();
        let r = n.resolve(Domain::Origin, Some("SAFRA"));
        assert_eq!(r.canonical, "SAFRA ALFENAS/MG");
        assert_eq!(r.via, MatchKind::Rule("safra-bare"));
    }

    #[test]
    fn test_accents_are_stripped_before_rules() {
        let n = NameNormalizer::builtin();
        assert_eq!(
            n.normalize(Domain::Origin, Some("Mosaic Cubatão 0099-60/SP")),
            "MOSAIC CUBATAO/SP"
        );
        assert_eq!(n.normalize(Domain::Destination, Some("icl jacareí")), "ICL JACAREÍ");
        assert_eq!(strip_accents("ÇÃÕÉÊÍÓÔÚÙÛÜ"), "CAOEEIOOUUUU");
    }

    #[test]
    fn test_domains_are_independent() {
        let n = NameNormalizer::builtin();
        assert_eq!(n.normalize(Domain::Origin, Some("SAFRA")), "SAFRA ALFENAS/MG");
        assert_eq!(n.normalize(Domain::Destination, Some("SAFRA")), "SAFRA ALFENAS");
    }

    #[test]
    fn test_fallthrough_is_cleaned_and_counted() {
        let n = NameNormalizer::builtin();
        let r = n.resolve(Domain::Origin, Some("  nova  empresa-ltda "));
        assert_eq!(r.canonical, "NOVA EMPRESA/LTDA");
        assert_eq!(r.via, MatchKind::Fallthrough);

        let mut report = DomainReport::default();
        report.record(&r);
        report.record(&r);
        report.record(&n.resolve(Domain::Origin, Some("JBS")));
        assert_eq!(report.fallthrough.get("NOVA EMPRESA/LTDA"), Some(&2));
        assert_eq!(report.fallthrough_total(), 2);
        assert_eq!(report.exact, 1);
    }

    #[test]
    fn test_extend_exact_overrides_and_self_keys() {
        let mut n = NameNormalizer::builtin();
        n.mapping_mut(Domain::Origin)
            .extend_exact(vec![("JBS FRIBOI".to_string(), "JBS LINS/SP".to_string())]);
        assert_eq!(n.normalize(Domain::Origin, Some("jbs friboi")), "JBS LINS/SP");
        assert_eq!(n.resolve(Domain::Origin, Some("JBS LINS/SP")).via, MatchKind::Exact);
    }
}
