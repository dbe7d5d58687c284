//! # Workflow Engine
//!
//! Dispatches named workflows and guarantees a [`WorkflowResult`] for every
//! call: unknown names and undecodable parameters produce a rejected result
//! rather than an error.

use super::request_manager::BatchRequestManager;
use super::workflows::{self, BulkDownloadParams, DistrictRefreshParams, MonitoringParams};
use crate::constants::workflows as names;
use crate::models::WorkflowResult;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, instrument, warn};

/// Older name for the bulk download workflow
const BULK_DOWNLOAD_ALIAS: &str = "bulk_file_download";

#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    manager: BatchRequestManager,
}

impl WorkflowEngine {
    pub fn new(manager: BatchRequestManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &BatchRequestManager {
        &self.manager
    }

    pub fn workflow_names() -> &'static [&'static str] {
        &names::ALL
    }

    /// Run a workflow by name with JSON parameters
    #[instrument(skip(self, params))]
    pub async fn run_workflow(&self, name: &str, params: Value) -> WorkflowResult {
        let result = match name {
            names::DISTRICT_REFRESH => match decode::<DistrictRefreshParams>(name, params) {
                Ok(params) => self.district_refresh(params).await,
                Err(rejected) => rejected,
            },
            names::BULK_DOWNLOAD | BULK_DOWNLOAD_ALIAS => {
                match decode::<BulkDownloadParams>(name, params) {
                    Ok(params) => self.bulk_download(params).await,
                    Err(rejected) => rejected,
                }
            }
            names::INTEGRATION_MONITORING => match decode::<MonitoringParams>(name, params) {
                Ok(params) => self.integration_monitoring(params).await,
                Err(rejected) => rejected,
            },
            unknown => {
                warn!(workflow = %unknown, "Unknown workflow requested");
                WorkflowResult::rejected(
                    unknown,
                    format!(
                        "Unknown workflow '{unknown}'; expected one of: {}",
                        names::ALL.join(", ")
                    ),
                )
            }
        };

        info!(
            workflow = %result.workflow,
            run_id = %result.run_id,
            success = result.success,
            steps_completed = result.steps_completed,
            total_steps = result.total_steps,
            "Workflow finished"
        );
        result
    }

    pub async fn district_refresh(&self, params: DistrictRefreshParams) -> WorkflowResult {
        workflows::district_refresh::run(&self.manager, params).await
    }

    pub async fn bulk_download(&self, params: BulkDownloadParams) -> WorkflowResult {
        workflows::bulk_download::run(&self.manager, params).await
    }

    pub async fn integration_monitoring(&self, params: MonitoringParams) -> WorkflowResult {
        workflows::monitoring::run(&self.manager, params).await
    }
}

fn decode<P: DeserializeOwned>(
    name: &str,
    params: Value,
) -> std::result::Result<P, WorkflowResult> {
    // Absent params decode as an empty object so all-default workflows can run
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|e| {
        warn!(workflow = %name, error = %e, "Invalid workflow parameters");
        WorkflowResult::rejected(name, format!("Invalid parameters for {name}: {e}"))
    })
}
