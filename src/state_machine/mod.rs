// State machine module for workflow runs
//
// A workflow run moves Pending -> Running -> {Completed, Failed}; WorkflowRun
// applies the step rules (fail-fast on required steps, record-and-continue on
// optional ones) and produces the final WorkflowResult.

pub mod states;
pub mod workflow_run;

// Re-export main types for convenient access
pub use states::{StepOutcome, StepRequirement, WorkflowState};
pub use workflow_run::WorkflowRun;
