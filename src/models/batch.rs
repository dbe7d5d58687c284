//! # Batch Results
//!
//! Per-item outcomes of a concurrency-bounded batch call and the aggregate
//! mapping keyed by request id.

use super::request::RequestId;
use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// How one batch item ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Succeeded,
    Failed,
    /// Never dispatched because the batch was cancelled or timed out
    Cancelled,
}

impl std::fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one unit of work within a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub request_id: RequestId,
    pub success: bool,
    pub outcome: BatchOutcome,
    pub message: String,
    /// Operation-specific details (bytes transferred, destination path, counts)
    pub payload: Value,
}

impl BatchItemResult {
    pub fn succeeded(request_id: RequestId, message: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id,
            success: true,
            outcome: BatchOutcome::Succeeded,
            message: message.into(),
            payload,
        }
    }

    pub fn failed(request_id: RequestId, message: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id,
            success: false,
            outcome: BatchOutcome::Failed,
            message: message.into(),
            payload,
        }
    }

    pub fn cancelled(request_id: RequestId) -> Self {
        Self {
            request_id,
            success: false,
            outcome: BatchOutcome::Cancelled,
            message: "Cancelled before dispatch".to_string(),
            payload: Value::Null,
        }
    }

    /// Convert a single-item error into a failed batch entry
    ///
    /// A partial rerun keeps its checksum count in the payload so callers can
    /// tell "checksums cleared, rerun missing" apart from a plain failure.
    pub fn from_error(request_id: RequestId, error: &RequestError) -> Self {
        let payload = match error {
            RequestError::PartialRerun {
                checksums_deleted, ..
            } => json!({
                "error_kind": error.kind().to_string(),
                "partial": true,
                "checksums_cleared": true,
                "checksums_deleted": checksums_deleted,
                "rerun_triggered": false,
            }),
            _ => json!({
                "error_kind": error.kind().to_string(),
                "retries_exhausted": error.is_retries_exhausted(),
            }),
        };
        Self::failed(request_id, error.to_string(), payload)
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == BatchOutcome::Cancelled
    }

    /// Read a numeric payload field, treating absence as zero
    pub fn payload_u64(&self, key: &str) -> u64 {
        self.payload.get(key).and_then(Value::as_u64).unwrap_or(0)
    }
}

/// Complete mapping from request id to item result for one batch call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchResults {
    results: HashMap<RequestId, BatchItemResult>,
}

impl BatchResults {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: HashMap::with_capacity(capacity),
        }
    }

    /// Record an item result; returns false if the key was already written
    pub fn insert(&mut self, result: BatchItemResult) -> bool {
        match self.results.entry(result.request_id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(result);
                true
            }
        }
    }

    pub fn get(&self, request_id: RequestId) -> Option<&BatchItemResult> {
        self.results.get(&request_id)
    }

    pub fn contains(&self, request_id: RequestId) -> bool {
        self.results.contains_key(&request_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchItemResult> {
        self.results.values()
    }

    fn count(&self, outcome: BatchOutcome) -> usize {
        self.results.values().filter(|r| r.outcome == outcome).count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.count(BatchOutcome::Succeeded)
    }

    pub fn failed_count(&self) -> usize {
        self.count(BatchOutcome::Failed)
    }

    pub fn cancelled_count(&self) -> usize {
        self.count(BatchOutcome::Cancelled)
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.values().all(|r| r.success)
    }

    /// Ids with the given outcome, sorted for stable reporting
    pub fn ids_with(&self, outcome: BatchOutcome) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self
            .results
            .values()
            .filter(|r| r.outcome == outcome)
            .map(|r| r.request_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn succeeded_ids(&self) -> Vec<RequestId> {
        self.ids_with(BatchOutcome::Succeeded)
    }

    pub fn failed_ids(&self) -> Vec<RequestId> {
        self.ids_with(BatchOutcome::Failed)
    }

    /// Sum of a numeric payload field across all items
    pub fn sum_payload(&self, key: &str) -> u64 {
        self.results.values().map(|r| r.payload_u64(key)).sum()
    }

    pub fn into_map(self) -> HashMap<RequestId, BatchItemResult> {
        self.results
    }

    /// JSON object keyed by request id, suitable for workflow payloads
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::with_capacity(self.results.len());
        for id in self.sorted_ids() {
            if let Some(result) = self.results.get(&id) {
                map.insert(
                    id.to_string(),
                    json!({
                        "success": result.success,
                        "outcome": result.outcome,
                        "message": result.message,
                        "payload": result.payload,
                    }),
                );
            }
        }
        Value::Object(map)
    }

    fn sorted_ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.results.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_write_once() {
        let mut results = BatchResults::default();
        assert!(results.insert(BatchItemResult::succeeded(1, "ok", Value::Null)));
        assert!(!results.insert(BatchItemResult::failed(1, "late", Value::Null)));
        assert!(results.get(1).unwrap().success);
    }

    #[test]
    fn test_counts_by_outcome() {
        let mut results = BatchResults::default();
        results.insert(BatchItemResult::succeeded(1, "ok", json!({"bytes_transferred": 10})));
        results.insert(BatchItemResult::succeeded(2, "ok", json!({"bytes_transferred": 5})));
        results.insert(BatchItemResult::failed(3, "boom", Value::Null));
        results.insert(BatchItemResult::cancelled(4));

        assert_eq!(results.len(), 4);
        assert_eq!(results.succeeded_count(), 2);
        assert_eq!(results.failed_count(), 1);
        assert_eq!(results.cancelled_count(), 1);
        assert_eq!(results.sum_payload("bytes_transferred"), 15);
        assert_eq!(results.succeeded_ids(), vec![1, 2]);
        assert!(!results.all_succeeded());
    }

    #[test]
    fn test_partial_rerun_payload() {
        let err = RequestError::PartialRerun {
            request_id: 9,
            checksums_deleted: 4,
            reason: "queue locked".into(),
        };
        let result = BatchItemResult::from_error(9, &err);
        assert!(!result.success);
        assert_eq!(result.payload["partial"], true);
        assert_eq!(result.payload["checksums_cleared"], true);
        assert_eq!(result.payload["rerun_triggered"], false);
        assert_eq!(result.payload_u64("checksums_deleted"), 4);
    }
}
