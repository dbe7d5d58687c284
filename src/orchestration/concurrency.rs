//! # Batch Executor
//!
//! Runs one async operation per request id through a bounded worker pool.
//!
//! ## Guarantees
//!
//! - At most `max_concurrent` operations are in flight; each holds a
//!   semaphore permit for its whole lifetime.
//! - The returned [`BatchResults`] covers every input id exactly once.
//! - One item's failure (or panic) never affects other items.
//! - The progress observer fires once per completed item, in completion order.
//! - Cancellation or timeout stops dispatch; in-flight items settle on their
//!   own and undispatched items are reported as [`BatchOutcome::Cancelled`].
//!
//! [`BatchOutcome::Cancelled`]: crate::models::BatchOutcome::Cancelled

use super::progress::{LoggingProgressObserver, ProgressObserver, ProgressUpdate};
use crate::error::{RequestError, Result};
use crate::logging::log_batch_operation;
use crate::models::{BatchItemResult, BatchResults, RequestId};
use futures::FutureExt;
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-call settings for a batch
#[derive(Clone)]
pub struct BatchOptions {
    pub max_concurrent: usize,
    pub observer: Option<Arc<dyn ProgressObserver>>,
    /// Caller-held abort handle; cancelling it stops dispatch
    pub cancellation: Option<CancellationToken>,
    /// Stop dispatching after this long
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOptions")
            .field("max_concurrent", &self.max_concurrent)
            .field("observer", &self.observer.is_some())
            .field("cancellation", &self.cancellation.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BatchOptions {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            observer: None,
            cancellation: None,
            timeout: None,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Log one line per completed item unless an observer is already set
    pub fn with_progress(mut self, show_progress: bool, operation: &str) -> Self {
        if show_progress && self.observer.is_none() {
            self.observer = Some(Arc::new(LoggingProgressObserver::new(operation)));
        }
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct BatchExecutor {
    options: BatchOptions,
}

impl BatchExecutor {
    pub fn new(options: BatchOptions) -> Self {
        Self { options }
    }

    fn validate(&self, request_ids: &[RequestId]) -> Result<()> {
        if self.options.max_concurrent == 0 {
            return Err(RequestError::validation("max_concurrent must be at least 1"));
        }
        if request_ids.is_empty() {
            return Err(RequestError::validation("batch contains no request ids"));
        }
        let mut seen = HashSet::with_capacity(request_ids.len());
        if let Some(duplicate) = request_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(RequestError::validation(format!(
                "duplicate request id {duplicate} in batch"
            )));
        }
        Ok(())
    }

    /// Run `op` once per id; only caller misuse (empty input, duplicate ids,
    /// zero concurrency) is returned as an error
    pub async fn run<F, Fut>(
        &self,
        operation: &str,
        request_ids: &[RequestId],
        op: F,
    ) -> Result<BatchResults>
    where
        F: Fn(RequestId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BatchItemResult> + Send + 'static,
    {
        self.validate(request_ids)?;

        let total = request_ids.len();
        let op = Arc::new(op);
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent));
        let token = self
            .options
            .cancellation
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let timeout = self.options.timeout;
        let deadline = async move {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => futures::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut pending: VecDeque<RequestId> = request_ids.iter().copied().collect();
        let mut in_flight: JoinSet<(RequestId, BatchItemResult)> = JoinSet::new();
        let mut results = BatchResults::with_capacity(total);
        let mut completed = 0usize;
        let mut success_count = 0usize;
        let mut cancelled = false;

        debug!(
            operation = %operation,
            total = total,
            max_concurrent = self.options.max_concurrent,
            "Starting batch"
        );

        loop {
            if in_flight.is_empty() && (cancelled || pending.is_empty()) {
                break;
            }
            let can_dispatch = !cancelled && !pending.is_empty();

            tokio::select! {
                biased;

                _ = token.cancelled(), if !cancelled => {
                    cancelled = true;
                    info!(operation = %operation, undispatched = pending.len(), "Batch cancelled, settling in-flight items");
                }
                _ = &mut deadline, if !cancelled => {
                    cancelled = true;
                    warn!(operation = %operation, undispatched = pending.len(), "Batch timed out, settling in-flight items");
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    match joined {
                        Ok((request_id, result)) => {
                            let success = result.success;
                            let message = result.message.clone();
                            if !results.insert(result) {
                                error!(operation = %operation, request_id = request_id, "Duplicate result for request ignored");
                                continue;
                            }
                            completed += 1;
                            if success {
                                success_count += 1;
                            }
                            self.notify(ProgressUpdate {
                                completed,
                                total,
                                request_id,
                                success,
                                success_count,
                                message,
                            });
                        }
                        Err(join_error) => {
                            error!(operation = %operation, error = %join_error, "Batch task did not complete");
                        }
                    }
                }
                Ok(permit) = semaphore.clone().acquire_owned(), if can_dispatch => {
                    let Some(request_id) = pending.pop_front() else {
                        continue;
                    };
                    let op = Arc::clone(&op);
                    in_flight.spawn(async move {
                        let _permit = permit;
                        let outcome = AssertUnwindSafe(async { op(request_id).await })
                            .catch_unwind()
                            .await;
                        let mut result = match outcome {
                            Ok(result) => result,
                            Err(panic) => BatchItemResult::failed(
                                request_id,
                                format!("Operation panicked: {}", panic_message(panic.as_ref())),
                                json!({ "error_kind": "operation", "panicked": true }),
                            ),
                        };
                        // Results are keyed by the dispatched id
                        result.request_id = request_id;
                        (request_id, result)
                    });
                }
                else => break,
            }
        }

        for request_id in pending {
            results.insert(BatchItemResult::cancelled(request_id));
        }
        for &request_id in request_ids {
            if !results.contains(request_id) {
                results.insert(BatchItemResult::failed(
                    request_id,
                    "Batch task aborted before reporting a result",
                    json!({ "error_kind": "operation" }),
                ));
            }
        }

        log_batch_operation(
            operation,
            total,
            results.succeeded_count(),
            results.failed_count(),
            results.cancelled_count(),
        );
        Ok(results)
    }

    fn notify(&self, update: ProgressUpdate) {
        let Some(observer) = &self.options.observer else {
            return;
        };
        let delivered =
            std::panic::catch_unwind(AssertUnwindSafe(|| observer.on_progress(&update)));
        if delivered.is_err() {
            warn!(request_id = update.request_id, "Progress observer panicked");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
