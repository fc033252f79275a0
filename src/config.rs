use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::info;

use crate::source::{FingerprintMode, SourceDescriptor, SourceKind};

/// Environment variable holding the path of a YAML config file.
pub const CONFIG_ENV: &str = "TERLOC_CONFIG";

/// Everything the loader needs to know about where data lives and how it is
/// read. Every field has a default, so an empty YAML document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerlocConfig {
    /// Bundled workbook.
    pub default_source: PathBuf,
    /// Where uploads are stored.
    pub user_source: PathBuf,
    pub cache_dir: PathBuf,
    /// Sheet to read; `None` takes the first one.
    pub sheet: Option<String>,
    pub row_cap: Option<usize>,
    /// Placeholder columns with fewer useful values than this are dropped, so
    /// the default keeps only those with more than ten.
    pub placeholder_min_values: usize,
    pub memory_ttl_secs: u64,
    pub fingerprint: FingerprintMode,
    /// Optional variant list merged into the built-in name tables.
    pub mapping_file: Option<PathBuf>,
}

impl Default for TerlocConfig {
    fn default() -> Self {
        Self {
            default_source: PathBuf::from("data/planilha_terloc.zip"),
            user_source: PathBuf::from("uploads/planilha_usuario"),
            cache_dir: PathBuf::from("cache_terloc"),
            sheet: Some("PLANILHA ÚNICA".to_string()),
            row_cap: Some(50_000),
            placeholder_min_values: 11,
            memory_ttl_secs: 600,
            fingerprint: FingerprintMode::Content,
            mapping_file: None,
        }
    }
}

impl TerlocConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config `{}`", path.display()))?;
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config `{}`", path.display()))?;
        Ok(config)
    }

    /// Load from `$TERLOC_CONFIG` when set, defaults otherwise.
    pub fn from_env() -> Result<Self> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                info!(path = %path.display(), "loading config");
                Self::from_yaml_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn source_path(&self, kind: SourceKind) -> &Path {
        match kind {
            SourceKind::Default => &self.default_source,
            SourceKind::User => &self.user_source,
        }
    }

    pub fn descriptor(&self, kind: SourceKind) -> SourceDescriptor {
        let mut descriptor = SourceDescriptor::new(kind, self.source_path(kind));
        if let Some(sheet) = &self.sheet {
            descriptor = descriptor.with_sheet(sheet.clone());
        }
        if let Some(cap) = self.row_cap {
            descriptor = descriptor.with_row_cap(cap);
        }
        descriptor
    }

    pub fn memory_ttl(&self) -> Duration {
        Duration::from_secs(self.memory_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_yaml_is_default() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("terloc.yaml");
        fs::write(&path, "{}\n").unwrap();
        assert_eq!(TerlocConfig::from_yaml_file(&path).unwrap(), TerlocConfig::default());
    }

    #[test]
    fn test_partial_yaml() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("terloc.yaml");
        fs::write(
            &path,
            "cache_dir: /var/cache/terloc\nsheet: null\nrow_cap: 200\nfingerprint: metadata\n",
        )
        .unwrap();
        let c = TerlocConfig::from_yaml_file(&path).unwrap();
        assert_eq!(c.cache_dir, PathBuf::from("/var/cache/terloc"));
        assert_eq!(c.fingerprint, FingerprintMode::Metadata);
        assert_eq!(c.placeholder_min_values, 11);

        let d = c.descriptor(SourceKind::User);
        assert_eq!(d.path, c.user_source);
        assert_eq!(d.sheet, None);
        assert_eq!(d.row_cap, Some(200));
    }

    #[test]
    fn test_bad_yaml_is_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("terloc.yaml");
        fs::write(&path, "row_cap: [not a number]\n").unwrap();
        assert!(TerlocConfig::from_yaml_file(&path).is_err());
        assert!(TerlocConfig::from_yaml_file(&tmp.path().join("absent.yaml")).is_err());
    }
}
