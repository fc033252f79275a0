//! On-disk cache of processed datasets, one entry per source kind.
//!
//! Each entry is two files under the cache directory:
//! - `snapshot_<kind>.parquet`: the dataset, SNAPPY-compressed
//! - `metadata_<kind>.json`: [`CacheMetadata`]
//!
//! The sidecar is the commit marker. `put` deletes it first and writes it
//! last, so an interrupted `put` leaves no entry rather than a torn one.

pub mod memory;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use glob::glob;
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::{
    dataset::{
        arrow::{from_record_batches, to_record_batch},
        Dataset,
    },
    error::CacheError,
    normalize::NormalizationReport,
    source::{ContentFingerprint, SourceDescriptor, SourceKind},
};

pub use memory::MemoryCache;

/// Sidecar record stored next to every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub source_label: String,
    pub source: SourceKind,
    pub descriptor: SourceDescriptor,
    pub produced_at: DateTime<Utc>,
    pub rows: usize,
    pub columns: usize,
    pub fingerprint: ContentFingerprint,
    #[serde(default)]
    pub report: NormalizationReport,
}

impl CacheMetadata {
    /// An entry serves `descriptor` only if it was produced from the same
    /// bytes under the same descriptor.
    pub fn is_valid_for(
        &self,
        descriptor: &SourceDescriptor,
        fingerprint: &ContentFingerprint,
    ) -> bool {
        self.fingerprint == *fingerprint && self.descriptor == *descriptor
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub metadata: CacheMetadata,
    pub dataset: Dataset,
}

pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open (creating if needed) the cache directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating cache dir `{}`", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self, kind: SourceKind) -> PathBuf {
        self.dir.join(format!("snapshot_{}.parquet", kind.as_str()))
    }

    pub fn metadata_path(&self, kind: SourceKind) -> PathBuf {
        self.dir.join(format!("metadata_{}.json", kind.as_str()))
    }

    /// Sidecar only. `Ok(None)` when no entry was ever committed.
    pub fn metadata(&self, kind: SourceKind) -> Result<Option<CacheMetadata>, CacheError> {
        let path = self.metadata_path(kind);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: CacheMetadata = serde_json::from_reader(io::BufReader::new(file))
            .map_err(|e| CacheError::corrupt(&path, format!("parsing metadata: {}", e)))?;
        if meta.source != kind {
            return Err(CacheError::corrupt(
                &path,
                format!("metadata belongs to the {} source", meta.source),
            ));
        }
        Ok(Some(meta))
    }

    /// Last committed entry for `kind`, snapshot included. No side effects.
    pub fn get(&self, kind: SourceKind) -> Result<Option<CacheEntry>, CacheError> {
        let metadata = match self.metadata(kind)? {
            Some(m) => m,
            None => return Ok(None),
        };
        let path = self.snapshot_path(kind);
        let dataset = read_snapshot(&path)?;

        if dataset.num_rows() != metadata.rows || dataset.num_columns() != metadata.columns {
            return Err(CacheError::corrupt(
                &path,
                format!(
                    "snapshot is {}x{}, metadata says {}x{}",
                    dataset.num_rows(),
                    dataset.num_columns(),
                    metadata.rows,
                    metadata.columns
                ),
            ));
        }
        debug!(source = %kind, rows = metadata.rows, "cache entry read");
        Ok(Some(CacheEntry { metadata, dataset }))
    }

    /// Replace the entry for `descriptor.kind`.
    pub fn put(
        &self,
        descriptor: &SourceDescriptor,
        fingerprint: &ContentFingerprint,
        dataset: &Dataset,
        source_label: &str,
        report: &NormalizationReport,
    ) -> Result<CacheMetadata> {
        let kind = descriptor.kind;
        let meta_path = self.metadata_path(kind);
        remove_if_exists(&meta_path)?;

        let snap_path = self.snapshot_path(kind);
        write_snapshot(dataset, &snap_path)
            .with_context(|| format!("writing snapshot `{}`", snap_path.display()))?;

        let metadata = CacheMetadata {
            source_label: source_label.to_string(),
            source: kind,
            descriptor: descriptor.clone(),
            produced_at: Utc::now(),
            rows: dataset.num_rows(),
            columns: dataset.num_columns(),
            fingerprint: fingerprint.clone(),
            report: report.clone(),
        };
        write_metadata(&metadata, &meta_path)?;

        info!(
            source = %kind,
            rows = metadata.rows,
            columns = metadata.columns,
            fingerprint = %metadata.fingerprint,
            "cache entry written"
        );
        Ok(metadata)
    }

    /// Drop the entry for `kind`. Returns whether anything was removed.
    pub fn invalidate(&self, kind: SourceKind) -> Result<bool> {
        let had_meta = remove_if_exists(&self.metadata_path(kind))?;
        let had_snap = remove_if_exists(&self.snapshot_path(kind))?;
        if had_meta || had_snap {
            info!(source = %kind, "cache entry invalidated");
        }
        Ok(had_meta || had_snap)
    }

    /// Delete `*.tmp` files left behind by interrupted writes.
    pub fn sweep_temp_files(&self) -> Result<usize> {
        let pattern = format!("{}/*.tmp", self.dir.display());
        let mut removed = 0;
        for entry in glob(&pattern).context("invalid glob pattern for cache sweep")? {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!("cannot read glob entry: {:?}", e);
                    continue;
                }
            };
            if path.is_file() {
                fs::remove_file(&path)
                    .with_context(|| format!("removing `{}`", path.display()))?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "swept orphaned temp files");
        }
        Ok(removed)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("removing `{}`", path.display())),
    }
}

fn write_snapshot(dataset: &Dataset, path: &Path) -> Result<()> {
    let batch = to_record_batch(dataset)?;
    let tmp = tmp_path(path);

    let file = File::create(&tmp)
        .with_context(|| format!("could not create temporary file `{}`", tmp.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
        .context("creating ArrowWriter for snapshot")?;
    writer.write(&batch).context("writing snapshot batch")?;
    writer.close().context("closing ArrowWriter for snapshot")?;

    fs::rename(&tmp, path)
        .with_context(|| format!("failed to rename `{}` to `{}`", tmp.display(), path.display()))?;
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<Dataset, CacheError> {
    let corrupt = |reason: String| CacheError::corrupt(path, reason);

    let file = File::open(path).map_err(|e| corrupt(format!("opening snapshot: {}", e)))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| corrupt(e.to_string()))?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(|e| corrupt(e.to_string()))?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| corrupt(e.to_string()))?;

    from_record_batches(&schema, &batches).map_err(|e| corrupt(format!("{:#}", e)))
}

fn write_metadata(metadata: &CacheMetadata, path: &Path) -> Result<()> {
    let tmp = tmp_path(path);
    let mut file = File::create(&tmp)
        .with_context(|| format!("creating `{}`", tmp.display()))?;
    serde_json::to_writer_pretty(&mut file, metadata).context("serializing cache metadata")?;
    file.write_all(b"\n")?;
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming `{}` -> `{}`", tmp.display(), path.display()))?;
    Ok(())
}
