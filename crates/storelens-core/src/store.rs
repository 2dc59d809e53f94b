use std::path::{Path, PathBuf};
use std::time::SystemTime;

use polars::prelude::DataFrame;

use crate::error::{DatasetError, Result};
use crate::loader::{load_transactions, LoadReport};

/// Process-lifetime cache for the cleaned table.
///
/// The table is loaded on first access and reused until the source file's
/// modification time changes or `invalidate` is called. Filter changes never
/// trigger a reload; callers derive views from the shared table instead.
pub struct DatasetStore {
    path: PathBuf,
    cached: Option<CachedDataset>,
}

struct CachedDataset {
    table: DataFrame,
    report: LoadReport,
    source_modified: Option<SystemTime>,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&mut self) -> Result<&DataFrame> {
        Ok(&self.ensure_loaded()?.table)
    }

    pub fn report(&mut self) -> Result<&LoadReport> {
        Ok(&self.ensure_loaded()?.report)
    }

    /// Drops the cached table so the next access reloads from disk.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    fn ensure_loaded(&mut self) -> Result<&CachedDataset> {
        let current = source_modified(&self.path);
        let stale = self
            .cached
            .as_ref()
            .map_or(true, |cached| cached.source_modified != current);

        if stale {
            let outcome = load_transactions(&self.path)?;
            self.cached = Some(CachedDataset {
                table: outcome.table,
                report: outcome.report,
                source_modified: current,
            });
        }

        match self.cached.as_ref() {
            Some(cached) => Ok(cached),
            None => Err(DatasetError::Validation(
                "dataset cache unexpectedly empty".to_string(),
            )),
        }
    }
}

fn source_modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
