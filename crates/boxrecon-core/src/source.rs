//! Poll-and-refresh data sources
//!
//! A source hands out a table only when its content changed since the last
//! poll, so callers can refresh on a timer without reloading code or state.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::table::RawTable;

pub trait DataSource {
    /// Human-readable name for logging
    fn name(&self) -> String;

    /// The table if it changed since the previous poll, `None` otherwise
    fn poll(&mut self) -> Result<Option<RawTable>>;

    /// The most recently loaded table
    fn current(&self) -> Option<&RawTable>;
}

/// A CSV file watched by content hash
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
    digest: Option<String>,
    table: Option<RawTable>,
}

impl CsvFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            digest: None,
            table: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Digest of the last loaded file contents
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

impl DataSource for CsvFileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn poll(&mut self) -> Result<Option<RawTable>> {
        if !self.path.exists() {
            return Err(Error::NotFound(self.path.display().to_string()));
        }

        let bytes = fs::read(&self.path)?;
        let digest = hex::encode(Sha256::digest(&bytes));
        if self.digest.as_deref() == Some(digest.as_str()) {
            return Ok(None);
        }

        let table = RawTable::from_csv(bytes.as_slice())?;
        debug!(path = %self.path.display(), rows = table.len(), "Source changed");
        self.digest = Some(digest);
        self.table = Some(table.clone());
        Ok(Some(table))
    }

    fn current(&self) -> Option<&RawTable> {
        self.table.as_ref()
    }
}
