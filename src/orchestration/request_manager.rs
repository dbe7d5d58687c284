//! # Batch Request Manager
//!
//! Per-request operations (download, restore, rerun, checksum clear) built on
//! the two gateways and the retry policy. Each operation has a single-item
//! form that returns errors directly and a batch form that runs the
//! single-item form through [`BatchExecutor`] and folds every error into a
//! failed [`BatchItemResult`].
//!
//! ## Restore fallback
//!
//! Restore reads the processed file from
//! `<processed_root>/<request_id>/<file>`. Only when that path is absent does
//! it consult the backup archive (via the configured [`BackupPathResolver`]),
//! exactly once. A connectivity failure on the primary path is retried on the
//! primary path and never triggers the fallback.
//!
//! A request without an imported file name is restored as a whole: every
//! `.csv`/`.txt` file in `<processed_root>/<request_id>/` (or its backup
//! directory) is put back into the request's upload directory.

use super::concurrency::{BatchExecutor, BatchOptions};
use crate::config::ReqflowConfig;
use crate::constants::RESTORABLE_EXTENSIONS;
use crate::error::{RequestError, Result};
use crate::gateways::paths::{join_remote, normalize_remote_path};
use crate::gateways::{
    db_path_to_remote_path, default_backup_resolver, processed_path, BackupPathResolver,
    CredentialProvider, DataStoreGateway, FileStoreGateway,
};
#[cfg(feature = "postgres")]
use crate::gateways::{LocalFileStore, PgDataStore};
use crate::models::{BatchItemResult, BatchResults, Request, RequestId, RequestQuery, RequestType};
use crate::resilience::RetryPolicy;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where a restored file was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    Primary,
    BackupArchive,
}

impl RestoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::BackupArchive => "backup_archive",
        }
    }
}

/// Everything needed to move a request's file around
#[derive(Debug, Clone)]
struct ResolvedFile {
    request: Request,
    file_name: String,
    /// Import location on the file store
    remote_path: String,
}

#[derive(Clone)]
pub struct BatchRequestManager {
    data_store: Arc<dyn DataStoreGateway>,
    file_store: Arc<dyn FileStoreGateway>,
    credentials: Arc<dyn CredentialProvider>,
    retry_policy: RetryPolicy,
    config: Arc<ReqflowConfig>,
    backup_resolver: BackupPathResolver,
}

impl std::fmt::Debug for BatchRequestManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRequestManager")
            .field("credentials", &self.credentials)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl BatchRequestManager {
    pub fn new(
        data_store: Arc<dyn DataStoreGateway>,
        file_store: Arc<dyn FileStoreGateway>,
        credentials: Arc<dyn CredentialProvider>,
        config: ReqflowConfig,
    ) -> Self {
        let retry_policy = RetryPolicy::from(&config.retry);
        let backup_resolver = default_backup_resolver(config.file_store.backup_root.clone());
        Self {
            data_store,
            file_store,
            credentials,
            retry_policy,
            config: Arc::new(config),
            backup_resolver,
        }
    }

    /// PostgreSQL request catalog plus a file store rooted at `file_store.root`
    #[cfg(feature = "postgres")]
    pub async fn connect(
        config: &ReqflowConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let data_store = PgDataStore::connect(&config.database, credentials.as_ref()).await?;
        let file_store = LocalFileStore::new(&config.file_store.root);
        info!(
            file_store_root = %config.file_store.root,
            "Request manager connected"
        );
        Ok(Self::new(
            Arc::new(data_store),
            Arc::new(file_store),
            credentials,
            config.clone(),
        ))
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_backup_resolver(mut self, resolver: BackupPathResolver) -> Self {
        self.backup_resolver = resolver;
        self
    }

    pub fn config(&self) -> &ReqflowConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialProvider> {
        &self.credentials
    }

    /// Release gateway connections
    pub async fn shutdown(&self) {
        self.data_store.close().await;
        self.file_store.close().await;
        debug!("Request manager shut down");
    }

    pub fn download_options(&self) -> BatchOptions {
        BatchOptions::new(self.config.batch.download_max_concurrent)
            .with_timeout(self.config.batch.timeout())
    }

    pub fn restore_options(&self) -> BatchOptions {
        BatchOptions::new(self.config.batch.restore_max_concurrent)
            .with_timeout(self.config.batch.timeout())
    }

    pub fn rerun_options(&self) -> BatchOptions {
        BatchOptions::new(self.config.batch.rerun_max_concurrent)
            .with_timeout(self.config.batch.timeout())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn list_request_types(&self, name_filter: Option<&str>) -> Result<Vec<RequestType>> {
        self.retry_policy
            .execute("list_request_types", || {
                self.data_store.list_request_types(name_filter)
            })
            .await
    }

    pub async fn find_requests(&self, query: &RequestQuery) -> Result<Vec<Request>> {
        if query.statuses.is_empty() {
            return Err(RequestError::validation("at least one status is required"));
        }
        let requests = self
            .retry_policy
            .execute("find_requests", || self.data_store.find_requests(query))
            .await?;
        debug!(found = requests.len(), "Found requests");
        Ok(requests)
    }

    async fn lookup_request(&self, request_id: RequestId) -> Result<Request> {
        self.retry_policy
            .execute("get_request", || self.data_store.get_request(request_id))
            .await
    }

    /// File-store form of the path recorded for the request
    async fn remote_location(&self, request_id: RequestId) -> Result<String> {
        let location = self
            .retry_policy
            .execute("directory_path", || self.data_store.directory_path(request_id))
            .await?
            .ok_or_else(|| {
                RequestError::operation(
                    "resolve_file",
                    format!("request {request_id} has no remote location"),
                )
            })?;
        Ok(db_path_to_remote_path(&location))
    }

    async fn resolve_file(&self, request: Request) -> Result<ResolvedFile> {
        let request_id = request.request_id;
        let file_name = request
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| {
                RequestError::operation(
                    "resolve_file",
                    format!("request {request_id} has no associated file"),
                )
            })?;

        let location = self.remote_location(request_id).await?;
        let remote_path = if location.ends_with(&format!("/{file_name}")) {
            location
        } else {
            join_remote(&location, &file_name)
        };

        Ok(ResolvedFile {
            request,
            file_name,
            remote_path,
        })
    }

    // =========================================================================
    // Download
    // =========================================================================

    /// Fetch the request's imported file into `<destination>/RequestID_<id>/`
    #[instrument(skip(self, destination), fields(destination = %destination.display()))]
    pub async fn download(
        &self,
        request_id: RequestId,
        destination: &Path,
    ) -> Result<BatchItemResult> {
        let request = self.lookup_request(request_id).await?;
        let resolved = self.resolve_file(request).await?;
        let local_path = destination
            .join(format!("RequestID_{request_id}"))
            .join(&resolved.file_name);

        let bytes = self
            .retry_policy
            .execute("fetch", || {
                self.file_store.fetch(&resolved.remote_path, &local_path)
            })
            .await?;

        info!(request_id, bytes, remote = %resolved.remote_path, "Downloaded file");
        Ok(BatchItemResult::succeeded(
            request_id,
            format!("Downloaded {} ({bytes} bytes)", resolved.file_name),
            json!({
                "bytes_transferred": bytes,
                "local_path": local_path.display().to_string(),
                "remote_path": resolved.remote_path,
            }),
        ))
    }

    pub async fn download_batch(
        &self,
        request_ids: &[RequestId],
        destination: impl Into<PathBuf>,
        options: BatchOptions,
    ) -> Result<BatchResults> {
        let destination = Arc::new(destination.into());
        let manager = self.clone();
        BatchExecutor::new(options)
            .run("download", request_ids, move |request_id| {
                let manager = manager.clone();
                let destination = Arc::clone(&destination);
                async move {
                    manager
                        .download(request_id, &destination)
                        .await
                        .unwrap_or_else(|e| BatchItemResult::from_error(request_id, &e))
                }
            })
            .await
    }

    // =========================================================================
    // Restore
    // =========================================================================

    /// Fetch `remote_path` into `staged`, mapping a miss to `None`
    async fn fetch_if_present(&self, remote_path: &str, staged: &Path) -> Result<Option<u64>> {
        match self
            .retry_policy
            .execute("fetch", || self.file_store.fetch(remote_path, staged))
            .await
        {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Data files in `remote_dir`, or `None` when the directory is missing
    /// or holds nothing to restore
    async fn list_restorable(&self, remote_dir: &str) -> Result<Option<Vec<String>>> {
        let names = match self
            .retry_policy
            .execute("list", || self.file_store.list(remote_dir))
            .await
        {
            Ok(names) => names,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let restorable: Vec<String> = names
            .into_iter()
            .filter(|name| {
                Path::new(name)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        RESTORABLE_EXTENSIONS
                            .iter()
                            .any(|allowed| ext.eq_ignore_ascii_case(allowed))
                    })
            })
            .collect();
        Ok((!restorable.is_empty()).then_some(restorable))
    }

    /// Copy one remote file to another through a staged temp file
    async fn copy_via_staging(
        &self,
        request_id: RequestId,
        source_path: &str,
        remote_path: &str,
        temp_dir: &Path,
    ) -> Result<u64> {
        let staged = tempfile::Builder::new()
            .prefix(&format!("restore_{request_id}_"))
            .tempfile_in(temp_dir)?;
        let bytes = self
            .retry_policy
            .execute("fetch", || self.file_store.fetch(source_path, staged.path()))
            .await?;
        self.retry_policy
            .execute("put", || self.file_store.put(staged.path(), remote_path))
            .await?;
        Ok(bytes)
    }

    /// Put the request's processed output back at its import location
    ///
    /// Files are staged in temporary files under `temp_dir`, removed on
    /// every exit path.
    #[instrument(skip(self, temp_dir), fields(temp_dir = %temp_dir.display()))]
    pub async fn restore(&self, request_id: RequestId, temp_dir: &Path) -> Result<BatchItemResult> {
        let request = self.lookup_request(request_id).await?;
        tokio::fs::create_dir_all(temp_dir).await?;
        if request.file_name().is_some() {
            let resolved = self.resolve_file(request).await?;
            self.restore_file(resolved, temp_dir).await
        } else {
            self.restore_directory(request, temp_dir).await
        }
    }

    async fn restore_file(&self, resolved: ResolvedFile, temp_dir: &Path) -> Result<BatchItemResult> {
        let request_id = resolved.request.request_id;
        let primary = processed_path(
            &self.config.file_store.processed_root,
            request_id,
            &resolved.file_name,
        );

        let staged = tempfile::Builder::new()
            .prefix(&format!("restore_{request_id}_"))
            .tempfile_in(temp_dir)?;

        let (source, source_path, bytes) =
            match self.fetch_if_present(&primary, staged.path()).await? {
                Some(bytes) => (RestoreSource::Primary, primary, bytes),
                None => {
                    let backup = normalize_remote_path(&(self.backup_resolver)(
                        &resolved.request,
                        &resolved.file_name,
                    ));
                    warn!(
                        request_id,
                        primary = %primary,
                        backup = %backup,
                        "Processed file missing, falling back to backup archive"
                    );
                    match self.fetch_if_present(&backup, staged.path()).await {
                        Ok(Some(bytes)) => (RestoreSource::BackupArchive, backup, bytes),
                        Ok(None) => {
                            return Err(RequestError::not_found(format!(
                                "request {request_id}: primary {primary} and backup archive {backup} both missing"
                            )))
                        }
                        Err(e) => {
                            return Err(RequestError::operation(
                                "restore",
                                format!(
                                    "request {request_id}: primary {primary} missing, backup archive fallback failed: {e}"
                                ),
                            ))
                        }
                    }
                }
            };

        self.retry_policy
            .execute("put", || {
                self.file_store.put(staged.path(), &resolved.remote_path)
            })
            .await?;

        let message = match source {
            RestoreSource::Primary => format!("Restored {}", resolved.file_name),
            RestoreSource::BackupArchive => {
                format!("Restored {} from backup archive", resolved.file_name)
            }
        };
        info!(request_id, source = source.as_str(), remote = %resolved.remote_path, "Restored file");

        Ok(BatchItemResult::succeeded(
            request_id,
            message,
            json!({
                "source": source.as_str(),
                "source_path": source_path,
                "remote_path": resolved.remote_path,
                "bytes_transferred": bytes,
            }),
        ))
    }

    /// Put every data file of the request's processed directory into its
    /// upload directory
    async fn restore_directory(&self, request: Request, temp_dir: &Path) -> Result<BatchItemResult> {
        let request_id = request.request_id;
        let target_dir = self.remote_location(request_id).await?;
        let primary = processed_path(&self.config.file_store.processed_root, request_id, "");

        let (source, source_dir, names) = match self.list_restorable(&primary).await? {
            Some(names) => (RestoreSource::Primary, primary, names),
            None => {
                let backup = normalize_remote_path(&(self.backup_resolver)(&request, ""));
                warn!(
                    request_id,
                    primary = %primary,
                    backup = %backup,
                    "Processed directory missing, falling back to backup archive"
                );
                match self.list_restorable(&backup).await {
                    Ok(Some(names)) => (RestoreSource::BackupArchive, backup, names),
                    Ok(None) => {
                        return Err(RequestError::not_found(format!(
                            "request {request_id}: no data files in primary {primary} or backup archive {backup}"
                        )))
                    }
                    Err(e) => {
                        return Err(RequestError::operation(
                            "restore",
                            format!(
                                "request {request_id}: primary {primary} missing, backup archive fallback failed: {e}"
                            ),
                        ))
                    }
                }
            }
        };

        let mut bytes_transferred = 0u64;
        let mut restored = Vec::with_capacity(names.len());
        let mut failures = Vec::new();
        for name in &names {
            let source_path = join_remote(&source_dir, name);
            let remote_path = join_remote(&target_dir, name);
            match self
                .copy_via_staging(request_id, &source_path, &remote_path, temp_dir)
                .await
            {
                Ok(bytes) => {
                    bytes_transferred += bytes;
                    restored.push(name.clone());
                }
                Err(e) => {
                    warn!(request_id, file = %name, error = %e, "Failed to restore file");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        if !failures.is_empty() {
            return Err(RequestError::operation(
                "restore",
                format!(
                    "request {request_id}: restored {}/{} files from {source_dir}: {}",
                    restored.len(),
                    names.len(),
                    failures.join("; ")
                ),
            ));
        }

        let message = match source {
            RestoreSource::Primary => format!("Restored {} files", restored.len()),
            RestoreSource::BackupArchive => {
                format!("Restored {} files from backup archive", restored.len())
            }
        };
        info!(
            request_id,
            source = source.as_str(),
            remote = %target_dir,
            files = restored.len(),
            "Restored processed directory"
        );

        Ok(BatchItemResult::succeeded(
            request_id,
            message,
            json!({
                "source": source.as_str(),
                "source_path": source_dir,
                "remote_path": target_dir,
                "bytes_transferred": bytes_transferred,
                "files_restored": restored,
            }),
        ))
    }

    pub async fn restore_batch(
        &self,
        request_ids: &[RequestId],
        temp_dir: impl Into<PathBuf>,
        options: BatchOptions,
    ) -> Result<BatchResults> {
        let temp_dir = Arc::new(temp_dir.into());
        let manager = self.clone();
        BatchExecutor::new(options)
            .run("restore", request_ids, move |request_id| {
                let manager = manager.clone();
                let temp_dir = Arc::clone(&temp_dir);
                async move {
                    manager
                        .restore(request_id, &temp_dir)
                        .await
                        .unwrap_or_else(|e| BatchItemResult::from_error(request_id, &e))
                }
            })
            .await
    }

    // =========================================================================
    // Checksums and rerun
    // =========================================================================

    /// Delete checksum records; a request with none left yields `Ok(0)`
    #[instrument(skip(self, keys))]
    pub async fn clear_checksums(
        &self,
        request_id: RequestId,
        keys: Option<&[String]>,
    ) -> Result<u64> {
        let deleted = self
            .retry_policy
            .execute("delete_checksums", || {
                self.data_store.delete_checksums(request_id, keys)
            })
            .await?;
        debug!(request_id, deleted, "Cleared checksums");
        Ok(deleted)
    }

    pub async fn clear_checksums_batch(
        &self,
        request_ids: &[RequestId],
        keys: Option<Vec<String>>,
        options: BatchOptions,
    ) -> Result<BatchResults> {
        let keys = Arc::new(keys);
        let manager = self.clone();
        BatchExecutor::new(options)
            .run("clear_checksums", request_ids, move |request_id| {
                let manager = manager.clone();
                let keys = Arc::clone(&keys);
                async move {
                    match manager.clear_checksums(request_id, keys.as_deref()).await {
                        Ok(deleted) => BatchItemResult::succeeded(
                            request_id,
                            format!("Cleared {deleted} checksums"),
                            json!({ "checksums_deleted": deleted }),
                        ),
                        Err(e) => BatchItemResult::from_error(request_id, &e),
                    }
                }
            })
            .await
    }

    /// Optionally clear checksums, then trigger the rerun
    ///
    /// If checksums were cleared but the trigger fails, the error is
    /// [`RequestError::PartialRerun`] carrying the number of rows deleted.
    #[instrument(skip(self, checksum_keys))]
    pub async fn rerun(
        &self,
        request_id: RequestId,
        delete_checksums: bool,
        checksum_keys: Option<&[String]>,
    ) -> Result<BatchItemResult> {
        let checksums_deleted = if delete_checksums {
            self.clear_checksums(request_id, checksum_keys).await?
        } else {
            0
        };

        let triggered = self
            .retry_policy
            .execute("trigger_rerun", || self.data_store.trigger_rerun(request_id))
            .await;

        match triggered {
            Ok(queue_rows_updated) => {
                if queue_rows_updated == 0 {
                    warn!(request_id, "Rerun triggered but no queue entry was updated");
                }
                Ok(BatchItemResult::succeeded(
                    request_id,
                    format!(
                        "Rerun triggered ({queue_rows_updated} queue entries, {checksums_deleted} checksums deleted)"
                    ),
                    json!({
                        "checksums_cleared": delete_checksums,
                        "checksums_deleted": checksums_deleted,
                        "rerun_triggered": true,
                        "queue_rows_updated": queue_rows_updated,
                    }),
                ))
            }
            Err(e) if delete_checksums => Err(RequestError::PartialRerun {
                request_id,
                checksums_deleted,
                reason: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn rerun_batch(
        &self,
        request_ids: &[RequestId],
        delete_checksums: bool,
        checksum_keys: Option<Vec<String>>,
        options: BatchOptions,
    ) -> Result<BatchResults> {
        let checksum_keys = Arc::new(checksum_keys);
        let manager = self.clone();
        BatchExecutor::new(options)
            .run("rerun", request_ids, move |request_id| {
                let manager = manager.clone();
                let checksum_keys = Arc::clone(&checksum_keys);
                async move {
                    manager
                        .rerun(request_id, delete_checksums, checksum_keys.as_deref())
                        .await
                        .unwrap_or_else(|e| BatchItemResult::from_error(request_id, &e))
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::{
        DatabaseCredentials, FileStoreCredentials, InMemoryDataStore, InMemoryFileStore,
        StaticCredentialProvider,
    };
    use std::time::Duration;

    fn credentials() -> Arc<dyn CredentialProvider> {
        Arc::new(StaticCredentialProvider::new(
            DatabaseCredentials {
                username: "u".to_string(),
                password: "p".to_string(),
            },
            FileStoreCredentials {
                host: "h".to_string(),
                username: "u".to_string(),
                password: "p".to_string(),
            },
        ))
    }

    fn request(id: RequestId) -> Request {
        Request {
            request_id: id,
            district_id: 123,
            request_type_id: 10,
            request_type_name: "SAT Import".to_string(),
            imported_file_name: Some(format!(r"F:\FTProot\Districts\123\SAT\file_{id}.csv")),
            status: Some(5),
            request_time: None,
        }
    }

    fn manager(
        data: Arc<InMemoryDataStore>,
        files: Arc<InMemoryFileStore>,
    ) -> BatchRequestManager {
        BatchRequestManager::new(data, files, credentials(), ReqflowConfig::default())
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(1), 2.0))
    }

    #[tokio::test]
    async fn test_download_writes_under_request_directory() {
        let data = Arc::new(InMemoryDataStore::new());
        let files = Arc::new(InMemoryFileStore::new());
        data.insert_request(request(1));
        files.insert_file("/Districts/123/SAT/file_1.csv", b"hello".to_vec());
        let dest = tempfile::tempdir().unwrap();

        let result = manager(data, files).download(1, dest.path()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.payload_u64("bytes_transferred"), 5);
        assert!(dest.path().join("RequestID_1/file_1.csv").exists());
    }

    #[tokio::test]
    async fn test_download_without_file_is_operation_error() {
        let data = Arc::new(InMemoryDataStore::new());
        let mut no_file = request(2);
        no_file.imported_file_name = None;
        data.insert_request(no_file);
        let dest = tempfile::tempdir().unwrap();

        let err = manager(data, Arc::new(InMemoryFileStore::new()))
            .download(2, dest.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Operation);
        assert!(err.to_string().contains("no associated file"));
    }

    #[tokio::test]
    async fn test_restore_prefers_primary() {
        let data = Arc::new(InMemoryDataStore::new());
        let files = Arc::new(InMemoryFileStore::new());
        data.insert_request(request(3));
        files.insert_file("LinkIt/ETLProcessedFolder/001/3/file_3.csv", b"primary".to_vec());
        let temp = tempfile::tempdir().unwrap();

        let result = manager(data, Arc::clone(&files))
            .restore(3, temp.path())
            .await
            .unwrap();
        assert_eq!(result.payload["source"], "primary");
        assert_eq!(
            files.contents("/Districts/123/SAT/file_3.csv"),
            Some(b"primary".to_vec())
        );
    }

    fn request_without_file(id: RequestId, data: &InMemoryDataStore) {
        let mut no_file = request(id);
        no_file.imported_file_name = None;
        data.insert_request(no_file);
        data.set_district_directory(123, r"F:\FTProot\Districts\123\SAT");
    }

    #[tokio::test]
    async fn test_restore_without_file_puts_directory_back() {
        let data = Arc::new(InMemoryDataStore::new());
        let files = Arc::new(InMemoryFileStore::new());
        request_without_file(7, &data);
        files.insert_file("LinkIt/ETLProcessedFolder/001/7/scores.csv", b"scores".to_vec());
        files.insert_file("LinkIt/ETLProcessedFolder/001/7/Notes.TXT", b"notes".to_vec());
        files.insert_file("LinkIt/ETLProcessedFolder/001/7/run.log", b"log".to_vec());
        let temp = tempfile::tempdir().unwrap();

        let result = manager(data, Arc::clone(&files))
            .restore(7, temp.path())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.message, "Restored 2 files");
        assert_eq!(result.payload["source"], "primary");
        assert_eq!(result.payload["remote_path"], "/Districts/123/SAT");
        assert_eq!(result.payload_u64("bytes_transferred"), 11);
        assert_eq!(
            files.contents("/Districts/123/SAT/scores.csv"),
            Some(b"scores".to_vec())
        );
        assert_eq!(
            files.contents("/Districts/123/SAT/Notes.TXT"),
            Some(b"notes".to_vec())
        );
        assert!(files.contents("/Districts/123/SAT/run.log").is_none());
    }

    #[tokio::test]
    async fn test_restore_without_file_falls_back_to_backup_directory() {
        let data = Arc::new(InMemoryDataStore::new());
        let files = Arc::new(InMemoryFileStore::new());
        request_without_file(8, &data);
        files.insert_file(
            "LinkIt/BackupData/ETLProcessedFolder/001/8/scores.csv",
            b"backup".to_vec(),
        );
        let temp = tempfile::tempdir().unwrap();

        let result = manager(data, Arc::clone(&files))
            .restore(8, temp.path())
            .await
            .unwrap();
        assert_eq!(result.payload["source"], "backup_archive");
        assert_eq!(result.payload["files_restored"], serde_json::json!(["scores.csv"]));
        assert_eq!(
            files.contents("/Districts/123/SAT/scores.csv"),
            Some(b"backup".to_vec())
        );
    }

    #[tokio::test]
    async fn test_restore_without_file_or_output_is_not_found() {
        let data = Arc::new(InMemoryDataStore::new());
        request_without_file(9, &data);
        let temp = tempfile::tempdir().unwrap();

        let err = manager(data, Arc::new(InMemoryFileStore::new()))
            .restore(9, temp.path())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("no data files"));
    }

    #[tokio::test]
    async fn test_rerun_without_checksum_deletion() {
        let data = Arc::new(InMemoryDataStore::new());
        data.insert_request(request(4));
        data.set_checksums(4, ["k1"]);

        let result = manager(Arc::clone(&data), Arc::new(InMemoryFileStore::new()))
            .rerun(4, false, None)
            .await
            .unwrap();
        assert_eq!(result.payload["rerun_triggered"], true);
        assert_eq!(data.checksum_count(4), 1);
        assert_eq!(data.rerun_count(4), 1);
    }
}
