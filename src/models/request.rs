//! # Request Model
//!
//! One integration unit of work (for example a SAT or PSAT file import) tied
//! to a district and a request type.
//!
//! Requests are created by the data-store gateway in answer to a lookup and
//! are never mutated by the engine; state changes (checksum deletion, rerun)
//! go through explicit gateway operations.

use crate::constants::status;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type RequestId = i64;

/// Latest request per (district, request type) as returned by a lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Request {
    pub request_id: RequestId,
    pub district_id: i64,
    pub request_type_id: i64,
    pub request_type_name: String,
    /// Path of the imported file as recorded by the importer (may be a Windows path)
    pub imported_file_name: Option<String>,
    pub status: Option<i32>,
    pub request_time: Option<NaiveDateTime>,
}

impl Request {
    pub fn is_failed(&self) -> bool {
        self.status == Some(status::FAILED)
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == Some(status::SUCCEEDED)
    }

    /// Bare file name of the imported file, if any
    pub fn file_name(&self) -> Option<&str> {
        self.imported_file_name
            .as_deref()
            .map(|path| path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path))
            .filter(|name| !name.is_empty())
    }
}

/// Request type catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RequestType {
    pub request_type_id: i64,
    pub name: Option<String>,
}

/// Criteria for finding the latest requests
///
/// Type names are case-insensitive prefixes ("SAT" matches "SAT Import" and
/// "SAT_2024"). Empty filters mean "no restriction".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestQuery {
    #[serde(default)]
    pub type_ids: Vec<i64>,
    #[serde(default)]
    pub type_names: Vec<String>,
    #[serde(default)]
    pub district_ids: Vec<i64>,
    #[serde(default = "default_statuses")]
    pub statuses: Vec<i32>,
    /// Only requests made at or after this time
    #[serde(default)]
    pub since: Option<NaiveDateTime>,
}

fn default_statuses() -> Vec<i32> {
    status::DEFAULT_STATUSES.to_vec()
}

impl Default for RequestQuery {
    fn default() -> Self {
        Self {
            type_ids: Vec::new(),
            type_names: Vec::new(),
            district_ids: Vec::new(),
            statuses: default_statuses(),
            since: None,
        }
    }
}

impl RequestQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type_ids(mut self, type_ids: impl IntoIterator<Item = i64>) -> Self {
        self.type_ids = type_ids.into_iter().collect();
        self
    }

    pub fn with_type_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.type_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_district_ids(mut self, district_ids: impl IntoIterator<Item = i64>) -> Self {
        self.district_ids = district_ids.into_iter().collect();
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = i32>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn since(mut self, since: NaiveDateTime) -> Self {
        self.since = Some(since);
        self
    }

    /// Whether a request type name satisfies the prefix filter
    pub fn matches_type_name(&self, name: &str) -> bool {
        if self.type_names.is_empty() {
            return true;
        }
        let lowered = name.to_lowercase();
        self.type_names
            .iter()
            .any(|prefix| lowered.starts_with(&prefix.to_lowercase()))
    }

    /// In-memory evaluation of the filter, ignoring the "latest per pair" rule
    pub fn matches(&self, request: &Request) -> bool {
        let type_ok = (self.type_ids.is_empty() && self.type_names.is_empty())
            || self.type_ids.contains(&request.request_type_id)
            || (!self.type_names.is_empty() && self.matches_type_name(&request.request_type_name));

        let district_ok =
            self.district_ids.is_empty() || self.district_ids.contains(&request.district_id);

        let status_ok = request
            .status
            .map(|status| self.statuses.contains(&status))
            .unwrap_or(false);

        let since_ok = match (self.since, request.request_time) {
            (Some(since), Some(time)) => time >= since,
            (Some(_), None) => false,
            (None, _) => true,
        };

        type_ok && district_ok && status_ok && since_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(type_name: &str, status: Option<i32>) -> Request {
        Request {
            request_id: 1,
            district_id: 123,
            request_type_id: 7,
            request_type_name: type_name.to_string(),
            imported_file_name: Some(r"F:\FTProot\Districts\123\SAT\scores.csv".to_string()),
            status,
            request_time: None,
        }
    }

    #[test]
    fn test_file_name_handles_windows_paths() {
        assert_eq!(request("SAT", Some(5)).file_name(), Some("scores.csv"));

        let mut no_file = request("SAT", Some(5));
        no_file.imported_file_name = None;
        assert_eq!(no_file.file_name(), None);
    }

    #[test]
    fn test_type_name_prefix_is_case_insensitive() {
        let query = RequestQuery::new().with_type_names(["sat"]);
        assert!(query.matches_type_name("SAT Import"));
        assert!(!query.matches_type_name("PSAT Import"));
    }

    #[test]
    fn test_default_statuses_exclude_pending() {
        let query = RequestQuery::new();
        assert!(query.matches(&request("SAT", Some(4))));
        assert!(query.matches(&request("SAT", Some(5))));
        assert!(!query.matches(&request("SAT", Some(1))));
        assert!(!query.matches(&request("SAT", None)));
    }

    #[test]
    fn test_query_deserializes_with_defaults() {
        let query: RequestQuery = serde_json::from_str(r#"{"district_ids": [123]}"#).unwrap();
        assert_eq!(query.district_ids, vec![123]);
        assert_eq!(query.statuses, vec![4, 5]);
    }
}
