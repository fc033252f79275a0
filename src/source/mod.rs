pub mod fingerprint;
pub mod reader;

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

use crate::error::LoadError;

pub use fingerprint::{ContentFingerprint, FingerprintMode, Fingerprinter};
pub use reader::WorkbookReader;

/// Which of the two configured inputs a descriptor refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Default,
    User,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Default, SourceKind::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Default => "default",
            SourceKind::User => "user",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one tabular input. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub path: PathBuf,
    /// Sheet to select; `None` means the first sheet.
    pub sheet: Option<String>,
    /// Maximum number of data rows to read.
    pub row_cap: Option<usize>,
}

impl SourceDescriptor {
    pub fn new(kind: SourceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            sheet: None,
            row_cap: None,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_row_cap(mut self, cap: usize) -> Self {
        self.row_cap = Some(cap);
        self
    }

    pub(crate) fn unavailable(&self, reason: impl ToString) -> LoadError {
        LoadError::SourceUnavailable {
            source_kind: self.kind,
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(&self, reason: impl ToString) -> LoadError {
        LoadError::MalformedSource {
            source_kind: self.kind,
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Rows exactly as the reader found them, before typing and cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Column names from the header row, with placeholders for blank headers.
    pub headers: Vec<String>,
    /// Data rows, each padded or cut to `headers.len()` fields.
    pub rows: Vec<Vec<String>>,
    /// Human-readable description of where the rows came from.
    pub label: String,
}

/// Reads a descriptor's rows. The only seam through which raw bytes are parsed.
pub trait TabularReader {
    fn read(&self, descriptor: &SourceDescriptor) -> Result<RawTable, LoadError>;
}

impl<T: TabularReader + ?Sized> TabularReader for &T {
    fn read(&self, descriptor: &SourceDescriptor) -> Result<RawTable, LoadError> {
        (**self).read(descriptor)
    }
}

impl<T: TabularReader + ?Sized> TabularReader for Box<T> {
    fn read(&self, descriptor: &SourceDescriptor) -> Result<RawTable, LoadError> {
        (**self).read(descriptor)
    }
}
