use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt,
    fs::{self, File},
    io::{self, BufReader},
    path::Path,
    time::UNIX_EPOCH,
};

use super::SourceDescriptor;
use crate::error::LoadError;

/// Short digest identifying one version of a source file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How change is detected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// SHA-256 over every byte of the file.
    #[default]
    Content,
    /// Modification time plus byte size. Cheaper, but blind to same-size
    /// edits within the filesystem's mtime granularity.
    Metadata,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Fingerprinter {
    mode: FingerprintMode,
}

impl Fingerprinter {
    pub fn new(mode: FingerprintMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FingerprintMode {
        self.mode
    }

    /// Fingerprint the descriptor's file. An unreadable file comes back as
    /// `LoadError::SourceUnavailable`, never as a panic.
    pub fn fingerprint(
        &self,
        descriptor: &SourceDescriptor,
    ) -> Result<ContentFingerprint, LoadError> {
        let result = match self.mode {
            FingerprintMode::Content => content_digest(&descriptor.path),
            FingerprintMode::Metadata => metadata_signature(&descriptor.path),
        };
        result.map_err(|e| descriptor.unavailable(e))
    }
}

fn content_digest(path: &Path) -> io::Result<ContentFingerprint> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(ContentFingerprint(format!("{:x}", hasher.finalize())))
}

fn metadata_signature(path: &Path) -> io::Result<ContentFingerprint> {
    let meta = fs::metadata(path)?;
    if !meta.is_file() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
    }
    let mtime = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    Ok(ContentFingerprint(format!("m{}-s{}", mtime, meta.len())))
}
