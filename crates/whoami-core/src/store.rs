//! Counter store abstraction.

use async_trait::async_trait;

use crate::{
    client::ClientId,
    ledger::{VisitCounts, VisitTotals},
};

/// Backing store for visit counters.
///
/// Implemented by the Redis adapter (preferred, shared between instances)
/// and the JSON file adapter (single-instance fallback). The accounting
/// service holds both as `Arc<dyn CounterStore>` and picks one per call.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Add one visit to the global counter and to `client`'s counter as a
    /// single logical unit, returning the resulting counts.
    ///
    /// Concurrent calls on the same instance must never lose or double-count
    /// an increment.
    async fn increment(&self, client: &ClientId) -> anyhow::Result<VisitCounts>;

    /// Read the current totals without changing them.
    async fn snapshot(&self) -> anyhow::Result<VisitTotals>;

    /// Whether the store can take calls right now. Callers treat `false` as
    /// unavailable and do not wait.
    fn is_ready(&self) -> bool {
        true
    }

    /// Short backend label used in logs and health output.
    fn name(&self) -> &'static str;
}
