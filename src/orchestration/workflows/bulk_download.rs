//! Bulk download: find → download → summary report.
//!
//! The summary always runs once the download batch executed; per-item
//! failures are counted in the payload and do not fail the run.

use super::{batch_summary, query_from_filters, request_ids};
use crate::constants::{steps, workflows};
use crate::error::RequestError;
use crate::models::{BatchResults, WorkflowResult};
use crate::orchestration::request_manager::BatchRequestManager;
use crate::state_machine::{StepRequirement, WorkflowRun};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

const TOTAL_STEPS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkDownloadParams {
    /// Directory that receives one `RequestID_<id>` folder per request
    pub destination: PathBuf,
    #[serde(default)]
    pub type_names: Option<Vec<String>>,
    #[serde(default)]
    pub type_ids: Vec<i64>,
    #[serde(default)]
    pub district_ids: Vec<i64>,
    #[serde(default)]
    pub statuses: Option<Vec<i32>>,
    #[serde(default)]
    pub since: Option<NaiveDateTime>,
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub show_progress: bool,
}

impl BulkDownloadParams {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            type_names: None,
            type_ids: Vec::new(),
            district_ids: Vec::new(),
            statuses: None,
            since: None,
            max_concurrent: None,
            show_progress: false,
        }
    }
}

fn summarize(results: &BatchResults) -> Value {
    json!({
        "successful_requests": results.succeeded_count(),
        "failed_requests": results.failed_count(),
        "cancelled_requests": results.cancelled_count(),
        "total_requests": results.len(),
        "total_bytes": results.sum_payload("bytes_transferred"),
        "failed_ids": results.failed_ids(),
    })
}

pub(crate) async fn run(manager: &BatchRequestManager, params: BulkDownloadParams) -> WorkflowResult {
    let mut run = WorkflowRun::new(workflows::BULK_DOWNLOAD, TOTAL_STEPS);
    run.start();

    let query = query_from_filters(
        manager,
        params.type_names.clone(),
        params.type_ids.clone(),
        params.district_ids.clone(),
        params.statuses.clone(),
        params.since,
    );
    run.record("query", serde_json::to_value(&query).unwrap_or(Value::Null));

    let Some(requests) = run
        .step(steps::FIND_REQUESTS, StepRequirement::Required, async {
            let found = manager.find_requests(&query).await?;
            if found.is_empty() {
                return Err(RequestError::not_found("requests matching the download criteria"));
            }
            Ok(found)
        })
        .await
    else {
        run.record("requests_found", json!(0));
        return run.finish("Nothing downloaded");
    };

    let ids = request_ids(&requests);
    run.record("requests_found", json!(ids.len()));
    run.record(
        "request_details",
        Value::Array(
            requests
                .iter()
                .map(|r| {
                    json!({
                        "request_id": r.request_id,
                        "district_id": r.district_id,
                        "type_name": r.request_type_name,
                        "status": r.status,
                    })
                })
                .collect(),
        ),
    );

    let mut options = manager
        .download_options()
        .with_progress(params.show_progress, steps::DOWNLOAD_FILES);
    if let Some(max_concurrent) = params.max_concurrent {
        options = options.with_max_concurrent(max_concurrent);
    }

    let Some(downloads) = run
        .step(
            steps::DOWNLOAD_FILES,
            StepRequirement::Required,
            manager.download_batch(&ids, params.destination.clone(), options),
        )
        .await
    else {
        return run.finish("Bulk download failed");
    };
    run.record("download_results", downloads.to_json());
    run.record("download_summary", batch_summary(&downloads));

    let summary = run
        .step(steps::SUMMARY_REPORT, StepRequirement::Required, async {
            Ok(summarize(&downloads))
        })
        .await;
    if let Some(summary) = summary {
        run.record("summary", summary);
    }

    run.finish(format!(
        "Downloaded {}/{} requests ({} bytes)",
        downloads.succeeded_count(),
        ids.len(),
        downloads.sum_payload("bytes_transferred")
    ))
}
