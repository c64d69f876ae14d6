pub mod client;
pub mod config;
pub mod error;
pub mod ledger;
pub mod store;

pub use client::{resolve_client_id, ClientId};
pub use ledger::{VisitCounts, VisitLedger, VisitTotals};
pub use store::CounterStore;
