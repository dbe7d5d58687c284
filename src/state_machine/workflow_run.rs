//! # Workflow Run
//!
//! Tracks one workflow execution through `Pending → Running → {Completed, Failed}`,
//! counting completed steps and accumulating the machine-readable payload.
//!
//! Steps are awaited through [`WorkflowRun::step`], which applies the
//! fail-fast rule: a required step's error fails the run and every later
//! `step` call becomes a no-op, while an optional step's error is recorded
//! and execution continues.

use super::states::{StepOutcome, StepRequirement, WorkflowState};
use crate::error::Result;
use crate::logging::log_workflow_step;
use crate::models::WorkflowResult;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::future::Future;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct WorkflowRun {
    run_id: Uuid,
    workflow: String,
    state: WorkflowState,
    steps_completed: usize,
    total_steps: usize,
    data: Map<String, Value>,
    step_records: Vec<Value>,
    failure: Option<String>,
    started_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn new(workflow: impl Into<String>, total_steps: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            workflow: workflow.into(),
            state: WorkflowState::Pending,
            steps_completed: 0,
            total_steps,
            data: Map::new(),
            step_records: Vec::new(),
            failure: None,
            started_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn steps_completed(&self) -> usize {
        self.steps_completed
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn is_running(&self) -> bool {
        self.state == WorkflowState::Running
    }

    fn transition(&mut self, next: WorkflowState) {
        if self.state.can_transition_to(next) {
            debug!(
                workflow = %self.workflow,
                run_id = %self.run_id,
                from = %self.state,
                to = %next,
                "Workflow state transition"
            );
            self.state = next;
        } else {
            warn!(
                workflow = %self.workflow,
                from = %self.state,
                to = %next,
                "Ignoring invalid workflow state transition"
            );
        }
    }

    pub fn start(&mut self) {
        self.transition(WorkflowState::Running);
    }

    /// Add a key to the result payload
    pub fn record(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    fn push_step_record(
        &mut self,
        name: &str,
        requirement: StepRequirement,
        outcome: StepOutcome,
        message: Option<String>,
    ) {
        log_workflow_step(&self.workflow, name, &outcome.to_string(), message.as_deref());
        self.step_records.push(json!({
            "step": name,
            "requirement": requirement,
            "outcome": outcome,
            "message": message,
        }));
    }

    fn advance(&mut self) {
        debug_assert!(self.steps_completed < self.total_steps);
        self.steps_completed = (self.steps_completed + 1).min(self.total_steps);
    }

    /// Execute one step; returns its value, or `None` if it failed or the run
    /// is no longer running
    pub async fn step<T, Fut>(
        &mut self,
        name: &str,
        requirement: StepRequirement,
        operation: Fut,
    ) -> Option<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        if !self.is_running() {
            debug!(workflow = %self.workflow, step = name, state = %self.state, "Step not executed");
            return None;
        }

        match operation.await {
            Ok(value) => {
                self.advance();
                self.push_step_record(name, requirement, StepOutcome::Completed, None);
                Some(value)
            }
            Err(error) => {
                let message = error.to_string();
                match requirement {
                    StepRequirement::Required => {
                        self.failure = Some(format!(
                            "Workflow failed at step {} ({name}): {message}",
                            self.steps_completed + 1
                        ));
                        self.push_step_record(name, requirement, StepOutcome::Failed, Some(message));
                        self.transition(WorkflowState::Failed);
                    }
                    StepRequirement::Optional => {
                        warn!(workflow = %self.workflow, step = name, error = %message, "Optional step failed");
                        self.advance();
                        self.record(format!("{name}_error"), Value::String(message.clone()));
                        self.push_step_record(name, requirement, StepOutcome::Failed, Some(message));
                    }
                }
                None
            }
        }
    }

    /// Record a step disabled by the run's parameters
    pub fn skip(&mut self, name: &str, reason: &str) {
        self.push_step_record(
            name,
            StepRequirement::Optional,
            StepOutcome::Skipped,
            Some(reason.to_string()),
        );
    }

    /// Fail the run from outside a step (for example on an empty lookup)
    pub fn fail(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
        self.transition(WorkflowState::Failed);
    }

    /// Close the run and produce its result
    ///
    /// A run still `Running` completes successfully with `message`; a failed
    /// run keeps the failure message recorded by the failing step.
    pub fn finish(mut self, message: impl Into<String>) -> WorkflowResult {
        if self.state == WorkflowState::Running {
            self.transition(WorkflowState::Completed);
        } else if self.state == WorkflowState::Pending {
            self.transition(WorkflowState::Failed);
        }

        let success = self.state == WorkflowState::Completed;
        let message = match (success, self.failure.take()) {
            (false, Some(failure)) => failure,
            (_, _) => message.into(),
        };

        self.data
            .insert("steps".to_string(), Value::Array(self.step_records));

        WorkflowResult {
            run_id: self.run_id,
            workflow: self.workflow,
            state: self.state,
            success,
            message,
            data: Value::Object(self.data),
            steps_completed: self.steps_completed,
            total_steps: self.total_steps,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
