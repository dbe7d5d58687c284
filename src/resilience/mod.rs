//! # Resilience Module
//!
//! Retry with exponential backoff for gateway calls.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reqflow_core::error::RequestError;
//! use reqflow_core::resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), RequestError> {
//! let policy = RetryPolicy::new(3, Duration::from_millis(500), 2.0);
//!
//! let bytes = policy
//!     .execute("fetch_file", || async {
//!         // Gateway call here
//!         Ok::<u64, RequestError>(1024)
//!     })
//!     .await?;
//! # let _ = bytes;
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::{RetryPolicy, RetryState};
