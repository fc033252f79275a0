//! Schema discovery: which actual column plays which logical role.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::normalize::{strip_accents, Domain};

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    TicketDate,
    Date,
    OriginClient,
    SaleClient,
    TicketTime,
    PasswordTime,
    GateTime,
    InvoiceTime,
    ReleaseTime,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::TicketDate,
        Role::Date,
        Role::OriginClient,
        Role::SaleClient,
        Role::TicketTime,
        Role::PasswordTime,
        Role::GateTime,
        Role::InvoiceTime,
        Role::ReleaseTime,
    ];

    /// Header keys that identify the role outright.
    fn exact_keys(&self) -> &'static [&'static str] {
        match self {
            Role::TicketDate => &["DATA TICKET"],
            Role::Date => &["DATA"],
            Role::OriginClient => &["CLIENTE"],
            Role::SaleClient => &["CLIENTE DE VENDA"],
            Role::TicketTime => &["HORA TICKET"],
            Role::PasswordTime => &["HORARIO SENHA", "HORA SENHA"],
            Role::GateTime => &["HORA GATE", "HORARIO GATE"],
            Role::InvoiceTime => &["HORA RECEBIMENTO NF DE VENDA"],
            Role::ReleaseTime => &["HORARIO DE LIBERACAO", "HORA LIBERACAO"],
        }
    }

    /// Fallback token patterns: every token of one pattern must occur in the header key.
    fn token_patterns(&self) -> &'static [&'static [&'static str]] {
        match self {
            Role::TicketDate => &[&["DATA", "TICKET"]],
            Role::Date => &[],
            Role::OriginClient => &[],
            Role::SaleClient => &[&["CLIENTE", "VENDA"]],
            Role::TicketTime => &[&["HORA", "TICKET"]],
            Role::PasswordTime => &[&["SENHA"]],
            Role::GateTime => &[&["GATE"]],
            Role::InvoiceTime => &[&["NF", "VENDA"], &["RECEBIMENTO"]],
            Role::ReleaseTime => &[&["LIBERACAO"]],
        }
    }
}

impl From<Domain> for Role {
    fn from(domain: Domain) -> Self {
        match domain {
            Domain::Origin => Role::OriginClient,
            Domain::Destination => Role::SaleClient,
        }
    }
}

/// Header in comparison form: accents stripped, uppercased, single spaces.
pub fn header_key(header: &str) -> String {
    RE_SPACES
        .replace_all(strip_accents(header).to_uppercase().trim(), " ")
        .to_string()
}

/// Logical role → actual column name, computed once per load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    map: BTreeMap<Role, String>,
}

impl ColumnRoles {
    /// Exact header keys win; token patterns run afterwards in role order and never
    /// claim a column another role already holds.
    pub fn discover(columns: &[String]) -> Self {
        let keys: Vec<String> = columns.iter().map(|c| header_key(c)).collect();
        let mut map: BTreeMap<Role, String> = BTreeMap::new();
        let mut taken = vec![false; columns.len()];

        for role in Role::ALL {
            if let Some(j) = keys.iter().position(|k| role.exact_keys().contains(&k.as_str())) {
                if !taken[j] {
                    taken[j] = true;
                    map.insert(role, columns[j].clone());
                }
            }
        }

        for role in Role::ALL {
            if map.contains_key(&role) {
                continue;
            }
            let hit = role.token_patterns().iter().find_map(|tokens| {
                (0..columns.len())
                    .find(|&j| !taken[j] && tokens.iter().all(|t| keys[j].contains(t)))
            });
            if let Some(j) = hit {
                taken[j] = true;
                map.insert(role, columns[j].clone());
            }
        }

        Self { map }
    }

    pub fn column(&self, role: Role) -> Option<&str> {
        self.map.get(&role).map(String::as_str)
    }

    /// Column carrying the names of `domain`.
    pub fn name_column(&self, domain: Domain) -> Option<&str> {
        self.column(Role::from(domain))
    }

    /// Date used to anchor checkpoint times: the ticket date, else the generic date.
    pub fn anchor_date(&self) -> Option<&str> {
        self.column(Role::TicketDate).or_else(|| self.column(Role::Date))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        self.map.iter().map(|(r, c)| (*r, c.as_str()))
    }
}
