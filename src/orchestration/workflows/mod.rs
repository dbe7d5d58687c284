//! Named multi-step workflows run by [`WorkflowEngine`](super::WorkflowEngine).

pub mod bulk_download;
pub mod district_refresh;
pub mod monitoring;

pub use bulk_download::BulkDownloadParams;
pub use district_refresh::DistrictRefreshParams;
pub use monitoring::MonitoringParams;

use super::request_manager::BatchRequestManager;
use crate::models::{BatchResults, Request, RequestId, RequestQuery};
use chrono::NaiveDateTime;
use serde_json::{json, Value};

/// Build a lookup, filling unset type names and statuses from configuration
pub(crate) fn query_from_filters(
    manager: &BatchRequestManager,
    type_names: Option<Vec<String>>,
    type_ids: Vec<i64>,
    district_ids: Vec<i64>,
    statuses: Option<Vec<i32>>,
    since: Option<NaiveDateTime>,
) -> RequestQuery {
    let defaults = &manager.config().query;
    let mut query = RequestQuery::new()
        .with_type_ids(type_ids)
        .with_type_names(type_names.unwrap_or_else(|| defaults.default_type_names.clone()))
        .with_district_ids(district_ids)
        .with_statuses(statuses.unwrap_or_else(|| defaults.default_statuses.clone()));
    query.since = since;
    query
}

pub(crate) fn request_ids(requests: &[Request]) -> Vec<RequestId> {
    requests.iter().map(|r| r.request_id).collect()
}

pub(crate) fn batch_summary(results: &BatchResults) -> Value {
    json!({
        "total": results.len(),
        "succeeded": results.succeeded_count(),
        "failed": results.failed_count(),
        "cancelled": results.cancelled_count(),
        "failed_ids": results.failed_ids(),
    })
}
