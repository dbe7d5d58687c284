//! # Batch Progress Reporting
//!
//! Observers receive one [`ProgressUpdate`] per completed batch item, in
//! completion order. Closures taking `&ProgressUpdate` are observers too.

use crate::models::RequestId;
use serde::Serialize;
use tracing::info;

/// One completed item, with running totals for the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// Items finished so far, including this one
    pub completed: usize,
    pub total: usize,
    pub request_id: RequestId,
    pub success: bool,
    /// Successful items so far, including this one
    pub success_count: usize,
    pub message: String,
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

/// Emits one `info!` line per completed item: `[3/10] RequestID 42: ✓ message`
#[derive(Debug, Clone)]
pub struct LoggingProgressObserver {
    operation: String,
}

impl LoggingProgressObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl ProgressObserver for LoggingProgressObserver {
    fn on_progress(&self, update: &ProgressUpdate) {
        let mark = if update.success { "✓" } else { "✗" };
        info!(
            operation = %self.operation,
            request_id = update.request_id,
            completed = update.completed,
            total = update.total,
            success_count = update.success_count,
            "[{}/{}] RequestID {}: {} {}",
            update.completed,
            update.total,
            update.request_id,
            mark,
            update.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_closure_is_an_observer() {
        let seen = Mutex::new(Vec::new());
        let observer = |update: &ProgressUpdate| seen.lock().push(update.request_id);

        let update = ProgressUpdate {
            completed: 1,
            total: 2,
            request_id: 42,
            success: true,
            success_count: 1,
            message: "ok".to_string(),
        };
        observer.on_progress(&update);
        NoopObserver.on_progress(&update);
        LoggingProgressObserver::new("download").on_progress(&update);

        assert_eq!(*seen.lock(), vec![42]);
    }
}
