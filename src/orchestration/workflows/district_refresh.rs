//! District refresh: find → restore (optional) → clear checksums → rerun.
//!
//! Restore failures never stop the refresh; the payload's
//! `restore_confirmed` flag is true only when every restore succeeded.
//! Rerun targets the requests whose checksum clear succeeded, or every
//! found request when checksum deletion is disabled. Checksum clear and
//! rerun each fail the run when no request gets through them.

use super::{batch_summary, query_from_filters, request_ids};
use crate::constants::{steps, workflows};
use crate::error::RequestError;
use crate::models::{BatchResults, RequestId, WorkflowResult};
use crate::orchestration::request_manager::BatchRequestManager;
use crate::state_machine::{StepRequirement, WorkflowRun};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRefreshParams {
    pub district_ids: Vec<i64>,
    /// Type name prefixes; defaults to `query.default_type_names`
    #[serde(default)]
    pub type_names: Option<Vec<String>>,
    #[serde(default)]
    pub type_ids: Vec<i64>,
    #[serde(default)]
    pub statuses: Option<Vec<i32>>,
    #[serde(default)]
    pub since: Option<NaiveDateTime>,
    #[serde(default = "default_true")]
    pub restore_files: bool,
    #[serde(default = "default_true")]
    pub delete_checksums: bool,
    /// Checksum keys to delete; `None` deletes all of them
    #[serde(default)]
    pub checksum_keys: Option<Vec<String>>,
    /// Staging directory for restores; defaults to the system temp dir
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub show_progress: bool,
}

fn default_true() -> bool {
    true
}

impl DistrictRefreshParams {
    pub fn new(district_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            district_ids: district_ids.into_iter().collect(),
            type_names: None,
            type_ids: Vec::new(),
            statuses: None,
            since: None,
            restore_files: true,
            delete_checksums: true,
            checksum_keys: None,
            temp_dir: None,
            max_concurrent: None,
            show_progress: false,
        }
    }

    /// Steps this run will execute
    pub fn total_steps(&self) -> usize {
        2 + usize::from(self.restore_files) + usize::from(self.delete_checksums)
    }
}

pub(crate) async fn run(
    manager: &BatchRequestManager,
    params: DistrictRefreshParams,
) -> WorkflowResult {
    if params.district_ids.is_empty() {
        return WorkflowResult::rejected(
            workflows::DISTRICT_REFRESH,
            "district refresh requires at least one district id",
        );
    }

    let mut run = WorkflowRun::new(workflows::DISTRICT_REFRESH, params.total_steps());
    run.start();
    run.record("districts", json!(params.district_ids));

    let query = query_from_filters(
        manager,
        params.type_names.clone(),
        params.type_ids.clone(),
        params.district_ids.clone(),
        params.statuses.clone(),
        params.since,
    );

    let Some(requests) = run
        .step(steps::FIND_REQUESTS, StepRequirement::Required, async {
            let found = manager.find_requests(&query).await?;
            if found.is_empty() {
                return Err(RequestError::not_found(
                    "requests matching the district refresh criteria",
                ));
            }
            Ok(found)
        })
        .await
    else {
        run.record("requests_found", json!(0));
        return run.finish("No requests refreshed");
    };

    let ids = request_ids(&requests);
    run.record("requests_found", json!(ids.len()));
    run.record("request_ids", json!(ids));

    // Restore (optional)
    let mut restore_confirmed = false;
    if params.restore_files {
        let temp_dir = params.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        let options = with_overrides(manager.restore_options(), &params, steps::RESTORE_FILES);
        let restored: Option<BatchResults> = run
            .step(
                steps::RESTORE_FILES,
                StepRequirement::Optional,
                manager.restore_batch(&ids, temp_dir, options),
            )
            .await;
        if let Some(results) = restored {
            restore_confirmed = results.all_succeeded();
            run.record("restore_results", results.to_json());
            run.record("restore_summary", batch_summary(&results));
        }
    } else {
        run.skip(steps::RESTORE_FILES, "restore disabled");
        run.record("restore_skipped", Value::Bool(true));
    }
    run.record("restore_confirmed", Value::Bool(restore_confirmed));

    // Clear checksums
    let rerun_targets: Vec<RequestId> = if params.delete_checksums {
        let options = with_overrides(manager.rerun_options(), &params, steps::CLEAR_CHECKSUMS);
        let cleared = run
            .step(steps::CLEAR_CHECKSUMS, StepRequirement::Required, async {
                let results = manager
                    .clear_checksums_batch(&ids, params.checksum_keys.clone(), options)
                    .await?;
                if results.succeeded_count() == 0 {
                    return Err(RequestError::operation(
                        steps::CLEAR_CHECKSUMS,
                        "checksum clear failed for every request",
                    ));
                }
                Ok(results)
            })
            .await;
        let Some(cleared) = cleared else {
            return run.finish("District refresh failed");
        };
        run.record("checksums_deleted", json!(cleared.sum_payload("checksums_deleted")));
        run.record("checksum_results", cleared.to_json());
        cleared.succeeded_ids()
    } else {
        run.skip(steps::CLEAR_CHECKSUMS, "checksum deletion disabled");
        ids.clone()
    };

    // Rerun
    let options = with_overrides(manager.rerun_options(), &params, steps::RERUN_REQUESTS);
    let Some(reruns) = run
        .step(steps::RERUN_REQUESTS, StepRequirement::Required, async {
            let results = manager
                .rerun_batch(&rerun_targets, false, None, options)
                .await?;
            if results.succeeded_count() == 0 {
                return Err(RequestError::operation(
                    steps::RERUN_REQUESTS,
                    "rerun failed for every request",
                ));
            }
            Ok(results)
        })
        .await
    else {
        return run.finish("District refresh failed");
    };

    run.record("queues_updated", json!(reruns.sum_payload("queue_rows_updated")));
    run.record("reruns_failed", json!(reruns.failed_count()));
    run.record("rerun_results", reruns.to_json());
    run.record("rerun_summary", batch_summary(&reruns));

    let mut message = format!(
        "District refresh completed for {} districts: {}/{} requests rerun",
        params.district_ids.len(),
        reruns.succeeded_count(),
        ids.len()
    );
    if reruns.failed_count() > 0 {
        message.push_str(&format!(" ({} failed)", reruns.failed_count()));
    }
    if !restore_confirmed {
        message.push_str(" (restore not confirmed)");
    }
    run.finish(message)
}

fn with_overrides(
    options: crate::orchestration::BatchOptions,
    params: &DistrictRefreshParams,
    operation: &str,
) -> crate::orchestration::BatchOptions {
    let options = match params.max_concurrent {
        Some(max_concurrent) => options.with_max_concurrent(max_concurrent),
        None => options,
    };
    options.with_progress(params.show_progress, operation)
}
