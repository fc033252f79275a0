//! Load orchestration: fingerprint, consult the cache, reprocess on a miss.
//!
//! Per source the cache moves through
//! `NoCache -> Valid -> Stale -> (reprocess) -> Valid`. A corrupt entry counts
//! as `NoCache`. Only [`LoadError`]s reach the caller; cache write failures are
//! logged and the freshly processed data is still returned.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::{
    fmt, fs,
    io::{self, Write},
    path::Path,
    sync::Arc,
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheEntry, CacheStore, MemoryCache},
    config::TerlocConfig,
    dataset::{Dataset, Value},
    error::{CacheError, LoadError},
    normalize::{Domain, NameNormalizer, NormalizationReport},
    schema::ColumnRoles,
    source::{
        ContentFingerprint, Fingerprinter, SourceDescriptor, SourceKind, TabularReader,
        WorkbookReader,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    NoCache,
    Valid,
    Stale,
}

impl CacheState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheState::NoCache => "NO_CACHE",
            CacheState::Valid => "CACHE_VALID",
            CacheState::Stale => "CACHE_STALE",
        }
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a loaded dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served from the on-disk cache without reading the raw source.
    Cache,
    /// Read and normalized from the raw source during this load.
    Reprocessed,
}

/// A ready-to-use dataset plus what is known about its provenance.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub source: SourceKind,
    pub label: String,
    pub dataset: Dataset,
    pub roles: ColumnRoles,
    pub freshness: Freshness,
    pub produced_at: DateTime<Utc>,
    pub fingerprint: ContentFingerprint,
    pub report: NormalizationReport,
}

pub struct LoadOrchestrator<R = WorkbookReader> {
    config: TerlocConfig,
    reader: R,
    normalizer: NameNormalizer,
    fingerprinter: Fingerprinter,
    cache: CacheStore,
    memory: MemoryCache<SourceKind, LoadedDataset>,
    user_error: Option<LoadError>,
}

impl LoadOrchestrator<WorkbookReader> {
    pub fn new(config: TerlocConfig) -> Result<Self> {
        Self::with_reader(config, WorkbookReader)
    }
}

impl<R: TabularReader> LoadOrchestrator<R> {
    pub fn with_reader(config: TerlocConfig, reader: R) -> Result<Self> {
        let normalizer = match &config.mapping_file {
            Some(path) => NameNormalizer::with_mapping_file(path),
            None => NameNormalizer::builtin(),
        };
        let cache = CacheStore::new(&config.cache_dir)?;
        Ok(Self {
            fingerprinter: Fingerprinter::new(config.fingerprint),
            memory: MemoryCache::new(config.memory_ttl()),
            config,
            reader,
            normalizer,
            cache,
            user_error: None,
        })
    }

    pub fn config(&self) -> &TerlocConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Why the last [`load`](Self::load) passed over a present user source.
    pub fn user_error(&self) -> Option<&LoadError> {
        self.user_error.as_ref()
    }

    /// Whether a load of `kind` right now would be served from disk. Reads
    /// only the cache sidecar and the source fingerprint.
    pub fn cache_state(&self, kind: SourceKind) -> Result<CacheState, LoadError> {
        let descriptor = self.config.descriptor(kind);
        let metadata = match self.cache.metadata(kind) {
            Ok(Some(m)) => m,
            Ok(None) => return Ok(CacheState::NoCache),
            Err(e) => {
                debug!(source = %kind, "unreadable cache metadata: {}", e);
                return Ok(CacheState::NoCache);
            }
        };
        let fingerprint = self.fingerprinter.fingerprint(&descriptor)?;
        Ok(if metadata.is_valid_for(&descriptor, &fingerprint) {
            CacheState::Valid
        } else {
            CacheState::Stale
        })
    }

    /// Data for the active source: the user source when it exists and yields
    /// rows, the default source otherwise. The two are never merged. A user
    /// source that fails to load is kept in [`user_error`](Self::user_error).
    pub fn load(&mut self) -> Result<Arc<LoadedDataset>, LoadError> {
        self.user_error = None;
        if self.user_source_present() {
            match self.load_source(SourceKind::User) {
                Ok(loaded) if !loaded.dataset.is_empty() => return Ok(loaded),
                Ok(_) => info!("user source has no rows; using default source"),
                Err(e) => {
                    warn!("{}; using default source", e);
                    self.user_error = Some(e);
                }
            }
        }
        self.load_source(SourceKind::Default)
    }

    /// Data for one source, through the memory cache and the disk cache.
    #[tracing::instrument(level = "info", skip(self), fields(source = %kind))]
    pub fn load_source(&mut self, kind: SourceKind) -> Result<Arc<LoadedDataset>, LoadError> {
        if let Some(hit) = self.memory.get(&kind) {
            debug!("memory cache hit");
            return Ok(hit);
        }

        let descriptor = self.config.descriptor(kind);
        let fingerprint = self.fingerprinter.fingerprint(&descriptor)?;

        let loaded = match self.valid_entry(&descriptor, &fingerprint) {
            Some(entry) => {
                info!(rows = entry.metadata.rows, "cache hit");
                LoadedDataset {
                    source: kind,
                    label: entry.metadata.source_label,
                    roles: ColumnRoles::discover(&entry.dataset.columns),
                    dataset: entry.dataset,
                    freshness: Freshness::Cache,
                    produced_at: entry.metadata.produced_at,
                    fingerprint,
                    report: entry.metadata.report,
                }
            }
            None => self.reprocess(&descriptor, fingerprint)?,
        };

        let loaded = Arc::new(loaded);
        self.memory.put(kind, loaded.clone());
        Ok(loaded)
    }

    /// Persist `bytes` as the user source and drop only that source's cache.
    pub fn upload(&mut self, bytes: &[u8]) -> Result<()> {
        let target = self.config.user_source.clone();
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).with_context(|| format!("creating `{}`", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in `{}`", dir.display()))?;
        tmp.write_all(bytes).context("writing upload")?;
        tmp.persist(&target)
            .with_context(|| format!("storing upload at `{}`", target.display()))?;

        self.memory.remove(&SourceKind::User);
        self.cache.invalidate(SourceKind::User)?;
        info!(path = %target.display(), bytes = bytes.len(), "user source uploaded");
        Ok(())
    }

    /// Delete the user source and its cache entry.
    pub fn remove_user_source(&mut self) -> Result<bool> {
        let path = &self.config.user_source;
        let removed = match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e).with_context(|| format!("removing `{}`", path.display())),
        };
        self.memory.remove(&SourceKind::User);
        self.cache.invalidate(SourceKind::User)?;
        if removed {
            info!(path = %path.display(), "user source removed");
        }
        Ok(removed)
    }

    /// Forget every cached result, in memory and on disk, then load again.
    pub fn refresh(&mut self) -> Result<Arc<LoadedDataset>> {
        self.memory.clear();
        self.cache.sweep_temp_files()?;
        for kind in SourceKind::ALL {
            self.cache.invalidate(kind)?;
        }
        info!("caches cleared; reloading");
        Ok(self.load()?)
    }

    fn user_source_present(&self) -> bool {
        fs::metadata(&self.config.user_source)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// The stored entry, if it matches `descriptor` and `fingerprint`.
    fn valid_entry(
        &self,
        descriptor: &SourceDescriptor,
        fingerprint: &ContentFingerprint,
    ) -> Option<CacheEntry> {
        match self.cache.get(descriptor.kind) {
            Ok(Some(entry)) if entry.metadata.is_valid_for(descriptor, fingerprint) => Some(entry),
            Ok(Some(entry)) => {
                info!(
                    stored = %entry.metadata.fingerprint,
                    current = %fingerprint,
                    "cache stale"
                );
                None
            }
            Ok(None) => {
                info!("no cache entry");
                None
            }
            Err(CacheError::Corrupt { path, reason }) => {
                warn!(path = %path.display(), "corrupt cache entry, reprocessing: {}", reason);
                None
            }
            Err(CacheError::Io(e)) => {
                warn!("cache unreadable, reprocessing: {}", e);
                None
            }
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(source = %descriptor.kind))]
    fn reprocess(
        &self,
        descriptor: &SourceDescriptor,
        fingerprint: ContentFingerprint,
    ) -> Result<LoadedDataset, LoadError> {
        let raw = self.reader.read(descriptor)?;
        let mut dataset = Dataset::from_raw(&raw);

        let dropped = dataset.prune_placeholder_columns(self.config.placeholder_min_values);
        if !dropped.is_empty() {
            info!(?dropped, "dropped placeholder columns");
        }

        let roles = ColumnRoles::discover(&dataset.columns);
        let report = normalize_names(&self.normalizer, &mut dataset, &roles);

        let produced_at = match self
            .cache
            .put(descriptor, &fingerprint, &dataset, &raw.label, &report)
        {
            Ok(meta) => meta.produced_at,
            Err(e) => {
                warn!("could not persist cache entry: {:#}", e);
                Utc::now()
            }
        };

        info!(
            rows = dataset.num_rows(),
            columns = dataset.num_columns(),
            label = %raw.label,
            "reprocessed"
        );
        Ok(LoadedDataset {
            source: descriptor.kind,
            label: raw.label,
            dataset,
            roles,
            freshness: Freshness::Reprocessed,
            produced_at,
            fingerprint,
            report,
        })
    }
}

/// Replace every cell of each name column with its canonical form.
fn normalize_names(
    normalizer: &NameNormalizer,
    dataset: &mut Dataset,
    roles: &ColumnRoles,
) -> NormalizationReport {
    let mut report = NormalizationReport::default();

    for domain in Domain::ALL {
        let idx = match roles.name_column(domain).and_then(|c| dataset.column_index(c)) {
            Some(j) => j,
            None => {
                debug!(%domain, "no name column");
                continue;
            }
        };
        let domain_report = report.domain_mut(domain);
        for row in dataset.rows.iter_mut() {
            let raw = row[idx].as_text();
            let resolution = normalizer.resolve(domain, raw.as_deref());
            domain_report.record(&resolution);
            row[idx] = Value::Text(resolution.canonical);
        }

        for (name, count) in &domain_report.fallthrough {
            debug!(%domain, name = %name, count, "unmapped name");
        }
        info!(
            %domain,
            exact = domain_report.exact,
            rule = domain_report.rule,
            sentinel = domain_report.sentinel,
            unmapped = domain_report.fallthrough_total(),
            "names normalized"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        path::PathBuf,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use tempfile::{tempdir, TempDir};

    use crate::source::{reader::tests::write_workbook, RawTable};

    /// Counts raw reads through to the real reader.
    struct CountingReader {
        reads: Arc<AtomicUsize>,
    }

    impl TabularReader for CountingReader {
        fn read(&self, descriptor: &SourceDescriptor) -> Result<RawTable, LoadError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            WorkbookReader.read(descriptor)
        }
    }

    fn config(tmp: &TempDir) -> TerlocConfig {
        TerlocConfig {
            default_source: tmp.path().join("default.csv"),
            user_source: tmp.path().join("uploads").join("user.csv"),
            cache_dir: tmp.path().join("cache"),
            sheet: None,
            row_cap: None,
            ..TerlocConfig::default()
        }
    }

    fn orchestrator(
        config: &TerlocConfig,
        reads: &Arc<AtomicUsize>,
    ) -> LoadOrchestrator<CountingReader> {
        LoadOrchestrator::with_reader(
            config.clone(),
            CountingReader {
                reads: reads.clone(),
            },
        )
        .unwrap()
    }

    fn csv(rows: usize, client: &str) -> String {
        let mut out = String::from("DATA  TICKET,CLIENTE,CLIENTE DE VENDA,PESO\n");
        for i in 0..rows {
            out.push_str(&format!(
                "2024-05-{:02},{},safra alfenas/mg,{}\n",
                i % 28 + 1,
                client,
                i
            ));
        }
        out
    }

    fn write(path: &PathBuf, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_second_load_served_from_cache() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        write(&cfg.default_source, &csv(500, "ELEIKEIROZ/ VARZEA-SP"));
        let reads = Arc::new(AtomicUsize::new(0));

        let mut orch = orchestrator(&cfg, &reads);
        assert_eq!(orch.cache_state(SourceKind::Default).unwrap(), CacheState::NoCache);
        let first = orch.load().unwrap();
        assert_eq!(first.freshness, Freshness::Reprocessed);
        assert_eq!(first.source, SourceKind::Default);
        assert!(first.dataset.num_rows() <= 500);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(orch.cache_state(SourceKind::Default).unwrap(), CacheState::Valid);

        let client = first.dataset.column_index("CLIENTE").unwrap();
        let sale = first.dataset.column_index("CLIENTE DE VENDA").unwrap();
        assert_eq!(first.dataset.rows[0][client], Value::Text("ELEKEIROZ VARZEA/SP".into()));
        assert_eq!(first.dataset.rows[0][sale], Value::Text("SAFRA ALFENAS".into()));
        assert_eq!(first.report.origin.rule, 500);

        // fresh orchestrator: empty memory cache, same disk cache
        reads.store(0, Ordering::SeqCst);
        let mut again = orchestrator(&cfg, &reads);
        let second = again.load().unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert_eq!(second.freshness, Freshness::Cache);
        assert_eq!(second.dataset, first.dataset);
        assert_eq!(second.report, first.report);
        assert_eq!(second.roles, first.roles);
    }

    #[test]
    fn test_changed_source_is_stale() {
        let tmp = tempdir().unwrap();
        let cfg = TerlocConfig {
            memory_ttl_secs: 0,
            ..config(&tmp)
        };
        write(&cfg.default_source, &csv(3, "JBS"));
        let reads = Arc::new(AtomicUsize::new(0));
        let mut orch = orchestrator(&cfg, &reads);
        orch.load().unwrap();

        write(&cfg.default_source, &csv(4, "JBS"));
        assert_eq!(orch.cache_state(SourceKind::Default).unwrap(), CacheState::Stale);
        let reloaded = orch.load().unwrap();
        assert_eq!(reloaded.freshness, Freshness::Reprocessed);
        assert_eq!(reloaded.dataset.num_rows(), 4);
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_descriptor_change_is_stale() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        write(&cfg.default_source, &csv(20, "JBS"));
        let reads = Arc::new(AtomicUsize::new(0));
        orchestrator(&cfg, &reads).load().unwrap();

        let capped = TerlocConfig {
            row_cap: Some(5),
            ..cfg
        };
        let mut orch = orchestrator(&capped, &reads);
        assert_eq!(orch.cache_state(SourceKind::Default).unwrap(), CacheState::Stale);
        let loaded = orch.load().unwrap();
        assert_eq!(loaded.dataset.num_rows(), 5);
        assert!(loaded.label.contains("limited to 5 rows"));
    }

    #[test]
    fn test_corrupt_cache_falls_through() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        write(&cfg.default_source, &csv(10, "JBS"));
        let reads = Arc::new(AtomicUsize::new(0));
        let first = orchestrator(&cfg, &reads).load().unwrap();

        let mut orch = orchestrator(&cfg, &reads);
        fs::write(orch.cache().snapshot_path(SourceKind::Default), b"garbage").unwrap();
        let loaded = orch.load().unwrap();
        assert_eq!(loaded.freshness, Freshness::Reprocessed);
        assert_eq!(loaded.dataset, first.dataset);
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(orch.cache_state(SourceKind::Default).unwrap(), CacheState::Valid);
    }

    #[test]
    fn test_malformed_source_leaves_cache_untouched() {
        let tmp = tempdir().unwrap();
        let cfg = TerlocConfig {
            memory_ttl_secs: 0,
            sheet: Some("PLANILHA ÚNICA".into()),
            default_source: tmp.path().join("default.zip"),
            ..config(&tmp)
        };
        write_workbook(&cfg.default_source, &[("PLANILHA ÚNICA", csv(3, "JBS").as_str())]);
        let reads = Arc::new(AtomicUsize::new(0));
        let mut orch = orchestrator(&cfg, &reads);
        orch.load().unwrap();
        let before = orch.cache().get(SourceKind::Default).unwrap().unwrap();

        write_workbook(&cfg.default_source, &[("OUTRA", csv(3, "JBS").as_str())]);
        let err = orch.load().unwrap_err();
        assert!(matches!(err, LoadError::MalformedSource { .. }));
        let after = orch.cache().get(SourceKind::Default).unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_default_is_unavailable() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        let reads = Arc::new(AtomicUsize::new(0));
        let err = orchestrator(&cfg, &reads).load().unwrap_err();
        assert!(matches!(err, LoadError::SourceUnavailable { .. }));
        assert_eq!(err.source_kind(), SourceKind::Default);
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_upload_then_remove() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        write(&cfg.default_source, &csv(5, "JBS"));
        let reads = Arc::new(AtomicUsize::new(0));
        let mut orch = orchestrator(&cfg, &reads);

        let default = orch.load().unwrap();
        assert_eq!(default.source, SourceKind::Default);

        orch.upload(csv(2, "SAFRA").as_bytes()).unwrap();
        let user = orch.load().unwrap();
        assert_eq!(user.source, SourceKind::User);
        assert_eq!(user.dataset.num_rows(), 2);
        let client = user.dataset.column_index("CLIENTE").unwrap();
        assert_eq!(user.dataset.rows[0][client], Value::Text("SAFRA ALFENAS/MG".into()));
        // the default entry survives the upload
        assert_eq!(orch.cache_state(SourceKind::Default).unwrap(), CacheState::Valid);

        assert!(orch.remove_user_source().unwrap());
        assert!(!cfg.user_source.exists());
        assert!(orch.cache().metadata(SourceKind::User).unwrap().is_none());
        let back = orch.load().unwrap();
        assert_eq!(back.source, SourceKind::Default);
        assert_eq!(back.dataset, default.dataset);
    }

    #[test]
    fn test_empty_user_source_falls_back() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        write(&cfg.default_source, &csv(5, "JBS"));
        write(&cfg.user_source, &csv(0, "JBS"));
        let reads = Arc::new(AtomicUsize::new(0));
        let mut orch = orchestrator(&cfg, &reads);
        let loaded = orch.load().unwrap();
        assert_eq!(loaded.source, SourceKind::Default);
        assert!(orch.user_error().is_none());
    }

    #[test]
    fn test_malformed_user_source_falls_back() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        write(&cfg.default_source, &csv(5, "JBS"));
        fs::create_dir_all(cfg.user_source.parent().unwrap()).unwrap();
        fs::write(&cfg.user_source, b"PK\x03\x04garbage").unwrap();
        let reads = Arc::new(AtomicUsize::new(0));
        let mut orch = orchestrator(&cfg, &reads);

        let loaded = orch.load().unwrap();
        assert_eq!(loaded.source, SourceKind::Default);
        assert_eq!(loaded.dataset.num_rows(), 5);
        let err = orch.user_error().unwrap();
        assert!(matches!(err, LoadError::MalformedSource { .. }));
        assert_eq!(err.source_kind(), SourceKind::User);

        // a good upload clears the recorded failure
        orch.upload(csv(2, "SAFRA").as_bytes()).unwrap();
        assert_eq!(orch.load().unwrap().source, SourceKind::User);
        assert!(orch.user_error().is_none());
    }

    #[test]
    fn test_failed_invalidation_still_drops_memory_entry() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        write(&cfg.default_source, &csv(5, "JBS"));
        let reads = Arc::new(AtomicUsize::new(0));
        let mut orch = orchestrator(&cfg, &reads);
        orch.upload(csv(2, "SAFRA").as_bytes()).unwrap();
        assert_eq!(orch.load().unwrap().dataset.num_rows(), 2);

        // a directory where the sidecar belongs makes invalidation fail
        let sidecar = orch.cache().metadata_path(SourceKind::User);
        fs::remove_file(&sidecar).unwrap();
        fs::create_dir(&sidecar).unwrap();

        assert!(orch.upload(csv(3, "SAFRA").as_bytes()).is_err());
        let user = orch.load().unwrap();
        assert_eq!(user.source, SourceKind::User);
        assert_eq!(user.dataset.num_rows(), 3);
    }

    #[test]
    fn test_refresh_reprocesses() {
        let tmp = tempdir().unwrap();
        let cfg = config(&tmp);
        write(&cfg.default_source, &csv(5, "JBS"));
        let reads = Arc::new(AtomicUsize::new(0));
        let mut orch = orchestrator(&cfg, &reads);
        orch.load().unwrap();
        orch.load().unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        fs::write(cfg.cache_dir.join("snapshot_default.parquet.tmp"), b"half").unwrap();
        let refreshed = orch.refresh().unwrap();
        assert_eq!(refreshed.freshness, Freshness::Reprocessed);
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert!(!cfg.cache_dir.join("snapshot_default.parquet.tmp").exists());
    }
}
