pub mod batch;
pub mod request;
pub mod workflow_result;

// Re-export core models for easy access
pub use batch::{BatchItemResult, BatchOutcome, BatchResults};
pub use request::{Request, RequestId, RequestQuery, RequestType};
pub use workflow_result::WorkflowResult;
