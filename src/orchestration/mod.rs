//! # Orchestration Engine
//!
//! Turns sets of request ids into bounded, retried, observable batch
//! operations and chains them into named workflows.
//!
//! ## Core Components
//!
//! - **BatchExecutor**: bounded worker pool with per-item failure isolation,
//!   progress reporting and cooperative cancellation
//! - **BatchRequestManager**: download, restore, rerun and checksum clear,
//!   each as a single-item call and a batch call
//! - **WorkflowEngine**: district refresh, bulk download and integration
//!   monitoring, each ending in a `WorkflowResult`
//!
//! Data flows `WorkflowEngine → BatchRequestManager → BatchExecutor →
//! gateways`, with the retry policy wrapping every gateway call. Progress
//! flows back up through the caller's `ProgressObserver`.

pub mod concurrency;
pub mod progress;
pub mod request_manager;
pub mod workflow_engine;
pub mod workflows;

pub use concurrency::{BatchExecutor, BatchOptions};
pub use progress::{LoggingProgressObserver, NoopObserver, ProgressObserver, ProgressUpdate};
pub use request_manager::{BatchRequestManager, RestoreSource};
pub use workflow_engine::WorkflowEngine;
pub use workflows::{BulkDownloadParams, DistrictRefreshParams, MonitoringParams};
