mod common;

use common::{import_path, manager_with, request, ConcurrencyGauge, Fault, ScriptedFileStore};
use reqflow_core::gateways::InMemoryDataStore;
use reqflow_core::models::{BatchItemResult, BatchOutcome, RequestId};
use reqflow_core::orchestration::{BatchExecutor, BatchOptions, ProgressUpdate};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn ok_item(request_id: RequestId) -> BatchItemResult {
    BatchItemResult::succeeded(request_id, "ok", Value::Null)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_never_exceeds_max_concurrent() {
    let ids: Vec<RequestId> = (1..=20).collect();

    for limit in [1usize, 3, 5] {
        let gauge = Arc::new(ConcurrencyGauge::default());
        let seen = Arc::clone(&gauge);
        let results = BatchExecutor::new(BatchOptions::new(limit))
            .run("gauge", &ids, move |id| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.enter();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    seen.exit();
                    ok_item(id)
                }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), ids.len());
        assert!(gauge.peak() <= limit, "peak {} > limit {limit}", gauge.peak());
        assert_eq!(gauge.calls(), ids.len());
    }
}

#[tokio::test]
async fn test_single_slot_runs_sequentially() {
    let gauge = Arc::new(ConcurrencyGauge::default());
    let seen = Arc::clone(&gauge);
    BatchExecutor::new(BatchOptions::new(1))
        .run("sequential", &[1, 2, 3, 4], move |id| {
            let seen = Arc::clone(&seen);
            async move {
                seen.enter();
                tokio::time::sleep(Duration::from_millis(2)).await;
                seen.exit();
                ok_item(id)
            }
        })
        .await
        .unwrap();
    assert_eq!(gauge.peak(), 1);
}

#[tokio::test]
async fn test_failures_do_not_affect_siblings() {
    let results = BatchExecutor::new(BatchOptions::new(4))
        .run("mixed", &[1, 2, 3, 4, 5, 6], |id| async move {
            match id {
                2 => panic!("item {id} exploded"),
                4 => BatchItemResult::failed(id, "bad file", Value::Null),
                _ => ok_item(id),
            }
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 6);
    assert_eq!(results.succeeded_ids(), vec![1, 3, 5, 6]);
    assert_eq!(results.failed_ids(), vec![2, 4]);
    assert!(results.get(2).unwrap().message.contains("exploded"));
}

#[tokio::test]
async fn test_results_are_keyed_by_dispatched_id() {
    // Operation reports the wrong id; the executor keys by what it dispatched
    let results = BatchExecutor::new(BatchOptions::new(2))
        .run("rekey", &[7, 8], |id| async move { ok_item(id + 1000) })
        .await
        .unwrap();
    assert!(results.contains(7));
    assert!(results.contains(8));
    assert_eq!(results.get(7).unwrap().request_id, 7);
}

#[tokio::test]
async fn test_progress_updates_are_monotonic() {
    let updates = Arc::new(parking_lot::Mutex::new(Vec::<ProgressUpdate>::new()));
    let sink = Arc::clone(&updates);
    let options = BatchOptions::new(3).with_observer(move |update: &ProgressUpdate| {
        sink.lock().push(update.clone());
    });

    BatchExecutor::new(options)
        .run("progress", &[1, 2, 3, 4, 5], |id| async move {
            if id == 3 {
                BatchItemResult::failed(id, "nope", Value::Null)
            } else {
                ok_item(id)
            }
        })
        .await
        .unwrap();

    let updates = updates.lock();
    assert_eq!(updates.len(), 5);
    let completed: Vec<usize> = updates.iter().map(|u| u.completed).collect();
    assert_eq!(completed, vec![1, 2, 3, 4, 5]);
    assert!(updates.iter().all(|u| u.total == 5));
    assert_eq!(updates.last().unwrap().success_count, 4);
}

#[tokio::test]
async fn test_panicking_observer_does_not_break_batch() {
    let options = BatchOptions::new(2).with_observer(|_: &ProgressUpdate| {
        panic!("observer bug");
    });
    let results = BatchExecutor::new(options)
        .run("observer", &[1, 2, 3], |id| async move { ok_item(id) })
        .await
        .unwrap();
    assert!(results.all_succeeded());
}

#[tokio::test]
async fn test_cancellation_reports_undispatched_items() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let ids: Vec<RequestId> = (1..=10).collect();

    let results = BatchExecutor::new(BatchOptions::new(1).with_cancellation(token))
        .run("cancel", &ids, move |id| {
            let trigger = trigger.clone();
            async move {
                if id == 2 {
                    trigger.cancel();
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                ok_item(id)
            }
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 10);
    // In-flight items settle normally
    assert_eq!(results.get(1).unwrap().outcome, BatchOutcome::Succeeded);
    assert_eq!(results.get(2).unwrap().outcome, BatchOutcome::Succeeded);
    assert!(results.cancelled_count() >= 1);
    assert_eq!(results.get(10).unwrap().outcome, BatchOutcome::Cancelled);
}

#[tokio::test]
async fn test_timeout_stops_dispatch() {
    let ids: Vec<RequestId> = (1..=6).collect();
    let options = BatchOptions::new(1).with_timeout(Some(Duration::from_millis(30)));

    let results = BatchExecutor::new(options)
        .run("timeout", &ids, |id| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ok_item(id)
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 6);
    assert!(results.succeeded_count() >= 1);
    assert!(results.cancelled_count() >= 1);
    assert_eq!(
        results.succeeded_count() + results.cancelled_count(),
        ids.len()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_download_batch_respects_limit_and_isolates_failures() {
    let data = Arc::new(InMemoryDataStore::new());
    let files = Arc::new(ScriptedFileStore::new().with_delay(Duration::from_millis(5)));
    let ids: Vec<RequestId> = (1..=12).collect();
    for &id in &ids {
        data.insert_request(request(id, 123));
        files.insert_file(&import_path(id, 123), format!("row,{id}").into_bytes());
    }
    files.always_fail(&import_path(5, 123), Fault::Operation);

    let manager = manager_with(data, files.clone());
    let dest = tempfile::tempdir().unwrap();
    let results = manager
        .download_batch(&ids, dest.path(), BatchOptions::new(3))
        .await
        .unwrap();

    assert_eq!(results.len(), 12);
    assert_eq!(results.failed_ids(), vec![5]);
    assert!(files.gauge.peak() <= 3);
    assert!(dest.path().join("RequestID_1/file_1.csv").exists());
    assert!(!dest.path().join("RequestID_5/file_5.csv").exists());
}
