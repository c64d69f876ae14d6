use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, warn};

use whoami_core::{ClientId, CounterStore, VisitCounts, VisitTotals};

#[derive(Debug, Error)]
pub enum AccountingError {
    /// The preferred store (if any) and the file store both failed.
    #[error("all visit stores failed: {0}")]
    AllStoresFailed(anyhow::Error),
}

/// Which kind of store a call should go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChoice {
    External,
    File,
}

/// Store selection policy: the external store while it is ready, the file
/// otherwise.
pub fn choose(preferred_ready: bool) -> StoreChoice {
    if preferred_ready {
        StoreChoice::External
    } else {
        StoreChoice::File
    }
}

/// Handle to the store picked for one call.
enum Store<'a> {
    External(&'a dyn CounterStore),
    File(&'a dyn CounterStore),
}

/// Records visits against the preferred store, falling back to the file
/// store per call.
///
/// Cheap to share behind an `Arc`; holds exactly one instance of each store
/// for the life of the process.
pub struct VisitAccounting {
    external: Option<Arc<dyn CounterStore>>,
    file: Arc<dyn CounterStore>,
    fallbacks: AtomicU64,
}

impl VisitAccounting {
    pub fn new(external: Option<Arc<dyn CounterStore>>, file: Arc<dyn CounterStore>) -> Self {
        Self {
            external,
            file,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// File store only; used when no external store is configured.
    pub fn file_only(file: Arc<dyn CounterStore>) -> Self {
        Self::new(None, file)
    }

    pub fn external_configured(&self) -> bool {
        self.external.is_some()
    }

    pub fn external_ready(&self) -> bool {
        self.external.as_ref().is_some_and(|store| store.is_ready())
    }

    /// Label of the store the next call would go to.
    pub fn active_store(&self) -> &'static str {
        match self.select() {
            Store::External(store) | Store::File(store) => store.name(),
        }
    }

    /// Number of calls that fell back to the file store after the external
    /// store failed mid-call.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Check that the file store, the fallback for every call, is readable.
    pub async fn ping_file(&self) -> anyhow::Result<()> {
        self.file.snapshot().await.map(|_| ())
    }

    fn select(&self) -> Store<'_> {
        match (&self.external, choose(self.external_ready())) {
            (Some(store), StoreChoice::External) => Store::External(store.as_ref()),
            _ => Store::File(self.file.as_ref()),
        }
    }

    /// Count one visit from `client`.
    ///
    /// A failing external store is bypassed for this call and the visit is
    /// recorded in the file store instead. Only when the file store fails as
    /// well is an error returned.
    pub async fn record(&self, client: &ClientId) -> Result<VisitCounts, AccountingError> {
        if let Store::External(store) = self.select() {
            match store.increment(client).await {
                Ok(counts) => return Ok(counts),
                Err(e) => {
                    self.fallbacks.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        store = store.name(),
                        client = %client,
                        error = %e,
                        "Preferred store increment failed, recording in file store"
                    );
                }
            }
        }

        self.file.increment(client).await.map_err(|e| {
            error!(client = %client, error = %e, "File store increment failed");
            AccountingError::AllStoresFailed(e)
        })
    }

    /// Current totals from the store `record` would use, with the same
    /// fallback rule.
    pub async fn snapshot(&self) -> Result<VisitTotals, AccountingError> {
        if let Store::External(store) = self.select() {
            match store.snapshot().await {
                Ok(totals) => return Ok(totals),
                Err(e) => {
                    warn!(
                        store = store.name(),
                        error = %e,
                        "Preferred store snapshot failed, reading file store"
                    );
                }
            }
        }

        self.file.snapshot().await.map_err(|e| {
            error!(error = %e, "File store snapshot failed");
            AccountingError::AllStoresFailed(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choose_prefers_external_only_when_ready() {
        assert_eq!(choose(true), StoreChoice::External);
        assert_eq!(choose(false), StoreChoice::File);
    }
}
