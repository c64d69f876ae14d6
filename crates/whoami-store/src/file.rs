use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use whoami_core::{ClientId, CounterStore, VisitCounts, VisitLedger, VisitTotals};

use crate::error::StoreError;

/// Visit ledger kept in a single JSON document on local disk.
///
/// Every increment reads the whole document, mutates it and writes it back
/// through a temp file + rename. The read-modify-write runs under
/// `write_lock`, so increments within one process are serialized. Nothing
/// guards against a second process writing the same file.
///
/// A failed write is logged and reported as [`StoreError::Write`]; the
/// document on disk keeps the last successful write, so no caller is ever
/// handed counts that were not persisted.
pub struct FileStore {
    path: PathBuf,
    tmp_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store backed by the document at `path`.
    ///
    /// Does not touch the filesystem; a missing document reads as an empty
    /// ledger. The parent directory must exist for writes to succeed.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        info!(path = %path.display(), "File visit store configured");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger, treating a missing or corrupt document as empty.
    pub async fn load(&self) -> Result<VisitLedger, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No visit ledger yet, starting empty");
                return Ok(VisitLedger::default());
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        match VisitLedger::from_json(&bytes) {
            Ok(ledger) => Ok(ledger),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Visit ledger unreadable, resetting to empty"
                );
                Ok(VisitLedger::default())
            }
        }
    }

    async fn persist(&self, ledger: &VisitLedger) -> Result<(), StoreError> {
        let payload = ledger.to_json()?;
        tokio::fs::write(&self.tmp_path, payload)
            .await
            .map_err(StoreError::Write)?;
        tokio::fs::rename(&self.tmp_path, &self.path)
            .await
            .map_err(StoreError::Write)?;
        Ok(())
    }
}

#[async_trait]
impl CounterStore for FileStore {
    async fn increment(&self, client: &ClientId) -> anyhow::Result<VisitCounts> {
        let _guard = self.write_lock.lock().await;

        let mut ledger = self.load().await?;
        let counts = ledger.record(client);

        if let Err(e) = self.persist(&ledger).await {
            warn!(
                path = %self.path.display(),
                total = counts.total,
                error = %e,
                "Visit ledger write failed, increment not persisted"
            );
            return Err(e.into());
        }

        Ok(counts)
    }

    async fn snapshot(&self) -> anyhow::Result<VisitTotals> {
        // rename() swaps the document atomically, so reads need no lock.
        Ok(self.load().await?.totals())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
