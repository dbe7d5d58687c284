//! Gateway contracts consumed by the request manager.
//!
//! Implementations must report failures as normalized [`RequestError`]s so
//! the retry policy can tell transient trouble from semantic failures.
//!
//! [`RequestError`]: crate::error::RequestError

use crate::error::Result;
use crate::models::{Request, RequestId, RequestQuery, RequestType};
use async_trait::async_trait;
use std::path::Path;

/// Lookups and mutations against the request catalog
#[async_trait]
pub trait DataStoreGateway: Send + Sync {
    /// Request types whose name contains `name_filter` (case-insensitive), ordered by name
    async fn list_request_types(&self, name_filter: Option<&str>) -> Result<Vec<RequestType>>;

    /// Latest request per (district, type) matching the query, newest first
    async fn find_requests(&self, query: &RequestQuery) -> Result<Vec<Request>>;

    /// Fails with `NotFound` when the id is unknown
    async fn get_request(&self, request_id: RequestId) -> Result<Request>;

    /// Remote directory or file recorded for a request: the imported file
    /// name if present, else the district's upload directory
    async fn directory_path(&self, request_id: RequestId) -> Result<Option<String>>;

    /// Delete checksum records of the request's active uploads; `None`
    /// deletes all keys. Returns rows deleted; zero is not an error.
    ///
    /// Uploads are those of the request's district whose directory covers
    /// [`directory_path`](Self::directory_path), or every upload in the
    /// district when no path is recorded.
    async fn delete_checksums(&self, request_id: RequestId, keys: Option<&[String]>)
        -> Result<u64>;

    /// Mark the latest queue entry of the request's uploads for
    /// reprocessing, scoped like `delete_checksums`; returns rows updated
    async fn trigger_rerun(&self, request_id: RequestId) -> Result<u64>;

    /// Release pooled connections
    async fn close(&self) {}
}

/// Remote file operations
#[async_trait]
pub trait FileStoreGateway: Send + Sync {
    /// Copy `remote_path` to `local_path`, returning bytes transferred.
    /// A missing remote file is `NotFound`.
    async fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<u64>;

    async fn put(&self, local_path: &Path, remote_path: &str) -> Result<()>;

    async fn exists(&self, remote_path: &str) -> Result<bool>;

    /// Names of the files directly inside `remote_dir`, sorted.
    /// A missing directory is `NotFound`.
    async fn list(&self, remote_dir: &str) -> Result<Vec<String>>;

    async fn close(&self) {}
}
