//! Shared fixtures for integration tests: request builders, a manager wired to
//! in-memory gateways, and scripted gateways that inject faults and record
//! call counts and concurrency.

#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use reqflow_core::config::ReqflowConfig;
use reqflow_core::gateways::paths::normalize_remote_path;
use reqflow_core::gateways::{
    CredentialProvider, DataStoreGateway, DatabaseCredentials, FileStoreCredentials,
    FileStoreGateway, InMemoryDataStore, InMemoryFileStore, StaticCredentialProvider,
};
use reqflow_core::models::{Request, RequestId, RequestQuery, RequestType};
use reqflow_core::orchestration::BatchRequestManager;
use reqflow_core::resilience::RetryPolicy;
use reqflow_core::{RequestError, Result};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const PROCESSED_ROOT: &str = "LinkIt/ETLProcessedFolder/001";
pub const BACKUP_ROOT: &str = "LinkIt/BackupData/ETLProcessedFolder/001";

/// Failure injected by the scripted gateways
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Connectivity,
    NotFound,
    Operation,
}

impl Fault {
    pub fn into_error(self, operation: &str) -> RequestError {
        match self {
            Fault::Connectivity => RequestError::connectivity(operation, "connection reset"),
            Fault::NotFound => RequestError::not_found(format!("{operation} target")),
            Fault::Operation => RequestError::operation(operation, "permission denied"),
        }
    }
}

pub fn credentials() -> Arc<dyn CredentialProvider> {
    Arc::new(StaticCredentialProvider::new(
        DatabaseCredentials {
            username: "etl".to_string(),
            password: "secret".to_string(),
        },
        FileStoreCredentials {
            host: "sftp.test".to_string(),
            username: "etl".to_string(),
            password: "secret".to_string(),
        },
    ))
}

/// Succeeded SAT request whose file was imported through its own upload
/// folder under the district
pub fn request(request_id: RequestId, district_id: i64) -> Request {
    Request {
        request_id,
        district_id,
        request_type_id: 10,
        request_type_name: "SAT Import".to_string(),
        imported_file_name: Some(format!(
            r"F:\FTProot\Districts\{district_id}\SAT\{request_id}\file_{request_id}.csv"
        )),
        status: Some(5),
        request_time: None,
    }
}

pub fn import_path(request_id: RequestId, district_id: i64) -> String {
    format!("/Districts/{district_id}/SAT/{request_id}/file_{request_id}.csv")
}

pub fn processed_path(request_id: RequestId) -> String {
    format!("/{PROCESSED_ROOT}/{request_id}/file_{request_id}.csv")
}

pub fn backup_path(request_id: RequestId) -> String {
    format!("/{BACKUP_ROOT}/{request_id}/file_{request_id}.csv")
}

/// Retry policy with millisecond delays so retry tests stay fast
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_millis(1), 2.0)
}

pub fn manager_with(
    data_store: Arc<dyn DataStoreGateway>,
    file_store: Arc<dyn FileStoreGateway>,
) -> BatchRequestManager {
    BatchRequestManager::new(
        data_store,
        file_store,
        credentials(),
        ReqflowConfig::default(),
    )
    .with_retry_policy(fast_retry(3))
}

/// Tracks how many calls overlap
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// In-memory file store with per-path fault scripts, call counts and an
/// optional per-fetch delay
#[derive(Debug, Default)]
pub struct ScriptedFileStore {
    inner: InMemoryFileStore,
    faults: Mutex<HashMap<String, VecDeque<Fault>>>,
    fetches: DashMap<String, usize>,
    puts: DashMap<String, usize>,
    delay: Option<Duration>,
    pub gauge: ConcurrencyGauge,
}

impl ScriptedFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert_file(&self, remote_path: &str, contents: impl Into<Vec<u8>>) {
        self.inner.insert_file(remote_path, contents);
    }

    pub fn contents(&self, remote_path: &str) -> Option<Vec<u8>> {
        self.inner.contents(remote_path)
    }

    /// Fail the next fetches of `remote_path` with these faults, in order
    pub fn script(&self, remote_path: &str, faults: impl IntoIterator<Item = Fault>) {
        self.faults
            .lock()
            .entry(normalize_remote_path(remote_path))
            .or_default()
            .extend(faults);
    }

    /// Fail every fetch of `remote_path`
    pub fn always_fail(&self, remote_path: &str, fault: Fault) {
        self.script(remote_path, std::iter::repeat(fault).take(64));
    }

    pub fn fetch_count(&self, remote_path: &str) -> usize {
        self.fetches
            .get(&normalize_remote_path(remote_path))
            .map(|n| *n)
            .unwrap_or(0)
    }

    pub fn put_count(&self, remote_path: &str) -> usize {
        self.puts
            .get(&normalize_remote_path(remote_path))
            .map(|n| *n)
            .unwrap_or(0)
    }

    fn next_fault(&self, remote_path: &str) -> Option<Fault> {
        self.faults
            .lock()
            .get_mut(remote_path)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl FileStoreGateway for ScriptedFileStore {
    async fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let key = normalize_remote_path(remote_path);
        *self.fetches.entry(key.clone()).or_insert(0) += 1;
        self.gauge.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = match self.next_fault(&key) {
            Some(fault) => Err(fault.into_error("fetch")),
            None => self.inner.fetch(remote_path, local_path).await,
        };
        self.gauge.exit();
        outcome
    }

    async fn put(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        *self
            .puts
            .entry(normalize_remote_path(remote_path))
            .or_insert(0) += 1;
        self.inner.put(local_path, remote_path).await
    }

    async fn exists(&self, remote_path: &str) -> Result<bool> {
        self.inner.exists(remote_path).await
    }

    async fn list(&self, remote_dir: &str) -> Result<Vec<String>> {
        self.inner.list(remote_dir).await
    }
}

/// In-memory data store with scripted rerun-trigger and lookup faults
#[derive(Debug, Default)]
pub struct ScriptedDataStore {
    pub inner: InMemoryDataStore,
    rerun_faults: DashMap<RequestId, Fault>,
    find_faults: Mutex<VecDeque<Fault>>,
    find_calls: AtomicUsize,
    trigger_calls: AtomicUsize,
}

impl ScriptedDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_rerun(&self, request_id: RequestId, fault: Fault) {
        self.rerun_faults.insert(request_id, fault);
    }

    pub fn script_find(&self, faults: impl IntoIterator<Item = Fault>) {
        self.find_faults.lock().extend(faults);
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn trigger_calls(&self) -> usize {
        self.trigger_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStoreGateway for ScriptedDataStore {
    async fn list_request_types(&self, name_filter: Option<&str>) -> Result<Vec<RequestType>> {
        self.inner.list_request_types(name_filter).await
    }

    async fn find_requests(&self, query: &RequestQuery) -> Result<Vec<Request>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.find_faults.lock().pop_front();
        match fault {
            Some(fault) => Err(fault.into_error("find_requests")),
            None => self.inner.find_requests(query).await,
        }
    }

    async fn get_request(&self, request_id: RequestId) -> Result<Request> {
        self.inner.get_request(request_id).await
    }

    async fn directory_path(&self, request_id: RequestId) -> Result<Option<String>> {
        self.inner.directory_path(request_id).await
    }

    async fn delete_checksums(
        &self,
        request_id: RequestId,
        keys: Option<&[String]>,
    ) -> Result<u64> {
        self.inner.delete_checksums(request_id, keys).await
    }

    async fn trigger_rerun(&self, request_id: RequestId) -> Result<u64> {
        self.trigger_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = self.rerun_faults.get(&request_id) {
            return Err(fault.into_error("trigger_rerun"));
        }
        self.inner.trigger_rerun(request_id).await
    }
}
