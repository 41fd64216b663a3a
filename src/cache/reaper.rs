//! Time-based eviction of stale cache entries.
//!
//! Runs once at the end of a successful build. A file is deleted when it was
//! not used by the current run and its modification time is older than the
//! retention period. Entries used by this run are kept regardless of age, and
//! a failed deletion is only logged: the file will be retried on the next run.

use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::error::ReapError;

use super::VariantCache;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Regular files inspected
    pub scanned: usize,

    /// Files kept (in use, or younger than the retention period)
    pub kept: usize,

    /// Files deleted
    pub deleted: usize,

    /// Files that could not be inspected or deleted
    pub failed: usize,
}

/// Deletes cache files that are unused and older than the retention period.
#[derive(Debug, Clone, Copy)]
pub struct CacheReaper {
    retention: Duration,
}

impl CacheReaper {
    pub fn new(retention: Duration) -> Self {
        Self { retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Sweep the cache directory.
    ///
    /// `protected` holds ids in use by the current run in addition to the
    /// ones the cache itself recorded as touched.
    ///
    /// # Errors
    ///
    /// Returns `ReapError::ReadDir` if the directory cannot be listed.
    /// Per-file failures are counted in the report instead.
    pub async fn reap(
        &self,
        cache: &VariantCache,
        protected: &HashSet<String>,
    ) -> Result<ReapReport, ReapError> {
        let dir = cache.dir();
        let read_dir_err = |e: std::io::Error| ReapError::ReadDir {
            dir: dir.display().to_string(),
            message: e.to_string(),
        };

        let touched = cache.touched().await;
        let mut entries = tokio::fs::read_dir(dir).await.map_err(read_dir_err)?;
        let mut report = ReapReport::default();
        let now = SystemTime::now();

        while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
            let path = entry.path();

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    report.failed += 1;
                    let err = ReapError::Stat {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    };
                    warn!(error = %err, "Skipping cache entry");
                    continue;
                }
            };

            if !metadata.is_file() {
                continue;
            }
            report.scanned += 1;

            let name = entry.file_name().to_string_lossy().into_owned();
            if touched.contains(&name) || protected.contains(&name) {
                report.kept += 1;
                continue;
            }

            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    report.failed += 1;
                    let err = ReapError::Stat {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    };
                    warn!(error = %err, "Skipping cache entry");
                    continue;
                }
            };

            // Clock skew (mtime in the future) counts as fresh
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= self.retention {
                report.kept += 1;
                continue;
            }

            debug!(name = %name, age_secs = age.as_secs(), "Deleting stale cached image");
            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    report.failed += 1;
                    let err = ReapError::Remove {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    };
                    warn!(error = %err, "Failed to delete stale cache entry");
                }
            }
        }

        info!(
            scanned = report.scanned,
            deleted = report.deleted,
            kept = report.kept,
            failed = report.failed,
            "Cache sweep finished"
        );

        Ok(report)
    }
}

// =============================================================================
// Tests
// =============================================================================
