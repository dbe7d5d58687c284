#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Reqflow Core
//!
//! Batch processing engine for data requests: bulk downloads of imported
//! files, restores from processed storage (with a backup-archive fallback),
//! checksum clearing and reruns, plus multi-step workflows built on top of
//! them.
//!
//! ## Architecture
//!
//! ```text
//! WorkflowEngine → BatchRequestManager → BatchExecutor → gateways
//!                                      ↘ RetryPolicy  ↗
//! ```
//!
//! The request catalog and the file store sit behind the
//! [`DataStoreGateway`](gateways::DataStoreGateway) and
//! [`FileStoreGateway`](gateways::FileStoreGateway) traits, so the engine
//! runs unchanged against PostgreSQL and a mounted file store in
//! production, or against the in-memory gateways in tests.
//!
//! ## Module Organization
//!
//! - [`config`] - Layered YAML + environment configuration
//! - [`error`] - Error taxonomy and retry classification
//! - [`gateways`] - Credential, data-store and file-store access
//! - [`models`] - Requests, batch results and workflow results
//! - [`orchestration`] - Bounded batch execution, request manager, workflows
//! - [`resilience`] - Retry with exponential backoff
//! - [`state_machine`] - Workflow run and step lifecycle
//! - [`logging`] - Structured tracing setup and operation log helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reqflow_core::config::ConfigManager;
//! use reqflow_core::gateways::EnvCredentialProvider;
//! use reqflow_core::orchestration::{BatchRequestManager, WorkflowEngine};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let credentials = Arc::new(EnvCredentialProvider::default());
//! let requests = BatchRequestManager::connect(manager.config(), credentials).await?;
//!
//! let engine = WorkflowEngine::new(requests);
//! let result = engine
//!     .run_workflow("district_refresh", json!({ "district_ids": [123, 456] }))
//!     .await;
//! println!("{}: {}", result.workflow, result.message);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod gateways;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod state_machine;

pub use config::{ConfigManager, ReqflowConfig};
pub use constants::{status, workflows as workflow_names};
pub use error::{ErrorKind, RequestError, Result};
pub use gateways::{CredentialProvider, DataStoreGateway, FileStoreGateway};
pub use models::{
    BatchItemResult, BatchOutcome, BatchResults, Request, RequestId, RequestQuery, RequestType,
    WorkflowResult,
};
pub use orchestration::{
    BatchExecutor, BatchOptions, BatchRequestManager, BulkDownloadParams, DistrictRefreshParams,
    MonitoringParams, ProgressObserver, ProgressUpdate, WorkflowEngine,
};
pub use resilience::RetryPolicy;
pub use state_machine::{WorkflowRun, WorkflowState};
