//! Locally authored reports that outlive a restart.
//!
//! The log stores reports together with the map points they produced, newest
//! first, so the dashboard can replay both into the live collection on
//! startup without going back through the backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::report::Report;
use crate::types::FloodPoint;

#[derive(Debug, thiserror::Error)]
pub enum LocalLogError {
    #[error("Local report log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Local report log is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Contents of the log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalReports {
    #[serde(default)]
    pub reports: Vec<Report>,
    #[serde(default)]
    pub points: Vec<FloodPoint>,
}

impl LocalReports {
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty() && self.points.is_empty()
    }
}

/// Append-only store for local reports.
pub trait LocalReportLog: Send + Sync {
    /// Everything stored so far. A log that was never written is empty.
    fn load(&self) -> Result<LocalReports, LocalLogError>;

    /// Record one report and its point ahead of the existing entries.
    fn append(&self, report: &Report, point: &FloodPoint) -> Result<(), LocalLogError>;
}

/// [`LocalReportLog`] backed by a single JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileReportLog {
    path: PathBuf,
}

impl JsonFileReportLog {
    /// Log stored at `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalReportLog for JsonFileReportLog {
    fn load(&self) -> Result<LocalReports, LocalLogError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LocalReports::default()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(LocalReports::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn append(&self, report: &Report, point: &FloodPoint) -> Result<(), LocalLogError> {
        let mut current = self.load()?;
        current.reports.insert(0, report.clone());
        current.points.insert(0, point.clone());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a truncated document.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&current)?)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), reports = current.reports.len(), "Appended local report");
        Ok(())
    }
}
