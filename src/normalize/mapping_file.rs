//! External variant lists.
//!
//! ```text
//! 1. Clientes
//! Nome Padrão: ADUFERTIL JUNDIAI/SP Variações:
//! ADUFERTIL JUNDIAI
//! ADUFERIL JUNDIAI
//! 2. Cliente de Venda
//! Nome Padrão: SAFRA ALFENAS Variações:
//! SAFRA IND. FERTL/ALFENAS
//! ```
//!
//! Section 1 extends the origin table, section 2 the destination table.

use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing::{info, warn};

use super::{Domain, NameNormalizer};

const ORIGIN_HEADER: &str = "1. Clientes";
const DESTINATION_HEADER: &str = "2. Cliente de Venda";
const BLOCK_MARKER: &str = "Nome Padrão:";
const VARIANTS_MARKER: &str = "Variações:";

/// (variant, canonical) pairs for each domain.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MappingOverrides {
    pub origin: Vec<(String, String)>,
    pub destination: Vec<(String, String)>,
}

impl MappingOverrides {
    pub fn is_empty(&self) -> bool {
        self.origin.is_empty() && self.destination.is_empty()
    }
}

pub fn parse_mapping(text: &str) -> MappingOverrides {
    let (origin_text, destination_text) = match text.split_once(DESTINATION_HEADER) {
        Some((a, b)) => (a, b),
        None => (text, ""),
    };
    let origin_text = origin_text.replacen(ORIGIN_HEADER, "", 1);

    MappingOverrides {
        origin: parse_section(&origin_text),
        destination: parse_section(destination_text),
    }
}

fn parse_section(section: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for block in section.split(BLOCK_MARKER).skip(1) {
        let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty());
        let canonical = match lines.next() {
            Some(first) => first.trim_end_matches(VARIANTS_MARKER).trim().to_string(),
            None => continue,
        };
        if canonical.is_empty() {
            continue;
        }
        for line in lines {
            if line != VARIANTS_MARKER {
                pairs.push((line.to_string(), canonical.clone()));
            }
        }
    }
    pairs
}

/// Read and parse a mapping file.
pub fn load_mapping_file(path: &Path) -> Result<MappingOverrides> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading mapping file {}", path.display()))?;
    Ok(parse_mapping(&text))
}

impl NameNormalizer {
    pub fn apply_overrides(&mut self, overrides: MappingOverrides) {
        self.mapping_mut(Domain::Origin).extend_exact(overrides.origin);
        self.mapping_mut(Domain::Destination)
            .extend_exact(overrides.destination);
    }

    /// Built-in tables extended by `path`. A missing or unreadable file
    /// leaves the built-in tables alone.
    pub fn with_mapping_file(path: &Path) -> Self {
        let mut normalizer = Self::builtin();
        match load_mapping_file(path) {
            Ok(overrides) => {
                info!(
                    path = %path.display(),
                    origin = overrides.origin.len(),
                    destination = overrides.destination.len(),
                    "mapping file loaded"
                );
                normalizer.apply_overrides(overrides);
            }
            Err(e) => warn!("ignoring mapping file: {:#}", e),
        }
        normalizer
    }
}
