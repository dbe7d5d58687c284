//! # Workflow Result
//!
//! Outcome of one multi-step workflow run. Workflows never return errors;
//! every run ends in one of these.

use crate::state_machine::WorkflowState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub workflow: String,
    pub state: WorkflowState,
    /// True only if every required step succeeded
    pub success: bool,
    pub message: String,
    /// Counts, per-step findings, skipped or failed optional steps
    pub data: Value,
    pub steps_completed: usize,
    pub total_steps: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl WorkflowResult {
    /// Result for a run that could not even start (unknown name, bad params)
    pub fn rejected(workflow: impl Into<String>, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            workflow: workflow.into(),
            state: WorkflowState::Failed,
            success: false,
            message: message.into(),
            data: Value::Object(serde_json::Map::new()),
            steps_completed: 0,
            total_steps: 0,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
