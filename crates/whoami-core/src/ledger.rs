//! Visit ledger data model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{client::ClientId, error::CoreError};

/// Counts returned by a single increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitCounts {
    pub total: u64,
    pub unique: u64,
    pub your_visits: u64,
}

/// Read-only aggregate counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisitTotals {
    pub total: u64,
    pub unique: u64,
}

/// Durable aggregate of all recorded visits.
///
/// Persisted as `{ "total": n, "byClient": { "<client>": n } }`. After every
/// [`VisitLedger::record`] call `total` equals the sum of `by_client`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitLedger {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub by_client: BTreeMap<String, u64>,
}

impl VisitLedger {
    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Count one visit from `client` and return the resulting counts.
    pub fn record(&mut self, client: &ClientId) -> VisitCounts {
        self.total += 1;
        let yours = self.by_client.entry(client.as_str().to_string()).or_insert(0);
        *yours += 1;
        let your_visits = *yours;
        VisitCounts {
            total: self.total,
            unique: self.unique(),
            your_visits,
        }
    }

    pub fn unique(&self) -> u64 {
        self.by_client.len() as u64
    }

    pub fn visits_of(&self, client: &ClientId) -> u64 {
        self.by_client.get(client.as_str()).copied().unwrap_or(0)
    }

    pub fn totals(&self) -> VisitTotals {
        VisitTotals {
            total: self.total,
            unique: self.unique(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_total_equal_to_sum_of_clients() {
        let mut ledger = VisitLedger::default();
        let a = ClientId::from("1.2.3.4");
        let b = ClientId::from("5.6.7.8");

        assert_eq!(
            ledger.record(&a),
            VisitCounts { total: 1, unique: 1, your_visits: 1 }
        );
        assert_eq!(
            ledger.record(&a),
            VisitCounts { total: 2, unique: 1, your_visits: 2 }
        );
        assert_eq!(
            ledger.record(&b),
            VisitCounts { total: 3, unique: 2, your_visits: 1 }
        );
        assert_eq!(ledger.total, ledger.by_client.values().sum::<u64>());
        assert_eq!(ledger.visits_of(&a), 2);
    }

    #[test]
    fn unknown_client_is_counted_under_empty_key() {
        let mut ledger = VisitLedger::default();
        let unknown = ClientId::default();
        ledger.record(&unknown);
        let counts = ledger.record(&unknown);
        assert_eq!(counts.your_visits, 2);
        assert_eq!(counts.unique, 1);
        assert_eq!(ledger.by_client.get(""), Some(&2));
    }

    #[test]
    fn json_layout_uses_by_client_field() {
        let mut ledger = VisitLedger::default();
        ledger.record(&ClientId::from("1.2.3.4"));
        let json: serde_json::Value =
            serde_json::from_slice(&ledger.to_json().expect("serialize")).expect("parse");
        assert_eq!(json["total"], 1);
        assert_eq!(json["byClient"]["1.2.3.4"], 1);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let ledger = VisitLedger::from_json(b"{}").expect("parse");
        assert_eq!(ledger, VisitLedger::default());
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        assert!(matches!(
            VisitLedger::from_json(b"not json"),
            Err(CoreError::Serialization(_))
        ));
    }

    #[test]
    fn counts_serialize_in_camel_case() {
        let json = serde_json::to_value(VisitCounts {
            total: 3,
            unique: 2,
            your_visits: 1,
        })
        .expect("serialize");
        assert_eq!(json["yourVisits"], 1);
    }
}
