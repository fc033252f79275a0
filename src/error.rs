use std::{io, path::PathBuf};

use thiserror::Error;

use crate::source::SourceKind;

/// User-visible load failures. Everything else degrades to reprocessing.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{source_kind} source `{}` is unavailable: {reason}", path.display())]
    SourceUnavailable {
        source_kind: SourceKind,
        path: PathBuf,
        reason: String,
    },
    #[error("{source_kind} source `{}` could not be read as a table: {reason}", path.display())]
    MalformedSource {
        source_kind: SourceKind,
        path: PathBuf,
        reason: String,
    },
}

impl LoadError {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            LoadError::SourceUnavailable { source_kind, .. }
            | LoadError::MalformedSource { source_kind, .. } => *source_kind,
        }
    }
}

/// Failures reading a persisted cache entry.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache entry `{}` is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CacheError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        CacheError::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
