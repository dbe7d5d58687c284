//! # In-Memory Gateways
//!
//! Thread-safe in-memory data store and file store for dry runs and testing.
//! They implement the same lookup rules as the database adapter: type names
//! match as case-insensitive prefixes, and only the latest request per
//! (district, type) is returned, newest first.
//!
//! Checksums and queue entries belong to district uploads, not to requests.
//! A request reaches the uploads of its district whose directory covers its
//! recorded path, so two requests imported from the same upload directory
//! share checksums and queue entries.

use super::paths::{directory_covers, normalize_remote_path, parent_directory};
use super::traits::{DataStoreGateway, FileStoreGateway};
use crate::error::{RequestError, Result};
use crate::models::{Request, RequestId, RequestQuery, RequestType};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;

/// One active integration upload of a district
#[derive(Debug, Clone)]
struct Upload {
    district_id: i64,
    directory_path: String,
    checksums: Vec<String>,
    queue_bumps: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    requests: DashMap<RequestId, Request>,
    request_types: RwLock<Vec<RequestType>>,
    /// district id -> first registered upload directory
    district_directories: DashMap<i64, String>,
    /// in registration order; the last match stands in for the latest queue row
    uploads: RwLock<Vec<Upload>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a request and register the upload directory of its imported file
    pub fn insert_request(&self, request: Request) {
        let mut types = self.request_types.write();
        if !types
            .iter()
            .any(|t| t.request_type_id == request.request_type_id)
        {
            types.push(RequestType {
                request_type_id: request.request_type_id,
                name: Some(request.request_type_name.clone()),
            });
        }
        drop(types);

        if let Some(directory) = request
            .imported_file_name
            .as_deref()
            .and_then(parent_directory)
        {
            self.add_upload(request.district_id, directory);
        }
        self.requests.insert(request.request_id, request);
    }

    /// Register an upload directory; repeated registrations are ignored
    pub fn add_upload(&self, district_id: i64, directory: impl Into<String>) {
        let directory = directory.into();
        let mut uploads = self.uploads.write();
        if uploads
            .iter()
            .any(|u| u.district_id == district_id && u.directory_path == directory)
        {
            return;
        }
        uploads.push(Upload {
            district_id,
            directory_path: directory,
            checksums: Vec::new(),
            queue_bumps: 0,
        });
    }

    /// Directory reported for requests of the district without an imported file
    pub fn set_district_directory(&self, district_id: i64, directory: impl Into<String>) {
        let directory = directory.into();
        self.district_directories
            .entry(district_id)
            .or_insert_with(|| directory.clone());
        self.add_upload(district_id, directory);
    }

    /// Replace the checksum keys of one upload
    pub fn set_upload_checksums<S: Into<String>>(
        &self,
        district_id: i64,
        directory: &str,
        keys: impl IntoIterator<Item = S>,
    ) {
        self.add_upload(district_id, directory);
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if let Some(upload) = self
            .uploads
            .write()
            .iter_mut()
            .find(|u| u.district_id == district_id && u.directory_path == directory)
        {
            upload.checksums = keys;
        }
    }

    /// Replace the checksum keys of the upload the request was imported from.
    /// Returns `false` when the request is unknown or has no upload directory.
    pub fn set_checksums<S: Into<String>>(
        &self,
        request_id: RequestId,
        keys: impl IntoIterator<Item = S>,
    ) -> bool {
        let Some(request) = self.requests.get(&request_id).map(|r| r.value().clone()) else {
            return false;
        };
        let home = match request.imported_file_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => parent_directory(name),
            None => self
                .district_directories
                .get(&request.district_id)
                .map(|d| d.value().clone()),
        };
        match home {
            Some(directory) => {
                self.set_upload_checksums(request.district_id, &directory, keys);
                true
            }
            None => false,
        }
    }

    /// Checksums reachable from the request
    pub fn checksum_count(&self, request_id: RequestId) -> usize {
        let Some((district_id, scope)) = self.scope_of(request_id) else {
            return 0;
        };
        self.uploads
            .read()
            .iter()
            .filter(|u| Self::in_scope(u, district_id, scope.as_deref()))
            .map(|u| u.checksums.len())
            .sum()
    }

    /// Queue bumps on the uploads reachable from the request
    pub fn rerun_count(&self, request_id: RequestId) -> u64 {
        let Some((district_id, scope)) = self.scope_of(request_id) else {
            return 0;
        };
        self.uploads
            .read()
            .iter()
            .filter(|u| Self::in_scope(u, district_id, scope.as_deref()))
            .map(|u| u.queue_bumps)
            .sum()
    }

    fn recorded_path(&self, request: &Request) -> Option<String> {
        match request.imported_file_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => Some(name.to_string()),
            None => self
                .district_directories
                .get(&request.district_id)
                .map(|d| d.value().clone()),
        }
    }

    fn scope_of(&self, request_id: RequestId) -> Option<(i64, Option<String>)> {
        let request = self.requests.get(&request_id)?;
        Some((request.district_id, self.recorded_path(request.value())))
    }

    fn scope_for(&self, request_id: RequestId) -> Result<(i64, Option<String>)> {
        self.scope_of(request_id)
            .ok_or_else(|| RequestError::not_found(format!("request {request_id}")))
    }

    fn in_scope(upload: &Upload, district_id: i64, scope: Option<&str>) -> bool {
        upload.district_id == district_id
            && scope.map_or(true, |path| directory_covers(&upload.directory_path, path))
    }
}

#[async_trait]
impl DataStoreGateway for InMemoryDataStore {
    async fn list_request_types(&self, name_filter: Option<&str>) -> Result<Vec<RequestType>> {
        let needle = name_filter.map(str::to_lowercase);
        let mut types: Vec<RequestType> = self
            .request_types
            .read()
            .iter()
            .filter(|t| match (&needle, &t.name) {
                (None, _) => true,
                (Some(needle), Some(name)) => name.to_lowercase().contains(needle.as_str()),
                (Some(_), None) => false,
            })
            .cloned()
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn find_requests(&self, query: &RequestQuery) -> Result<Vec<Request>> {
        // Latest request id per (district, type) among the allowed statuses
        let mut latest: HashMap<(i64, i64), Request> = HashMap::new();
        for entry in self.requests.iter() {
            let request = entry.value();
            if !request
                .status
                .map(|s| query.statuses.contains(&s))
                .unwrap_or(false)
            {
                continue;
            }
            let key = (request.district_id, request.request_type_id);
            match latest.get(&key) {
                Some(current) if current.request_id >= request.request_id => {}
                _ => {
                    latest.insert(key, request.clone());
                }
            }
        }

        let mut found: Vec<Request> = latest
            .into_values()
            .filter(|request| query.matches(request))
            .collect();
        found.sort_by(|a, b| {
            b.request_time
                .cmp(&a.request_time)
                .then(b.request_id.cmp(&a.request_id))
        });
        Ok(found)
    }

    async fn get_request(&self, request_id: RequestId) -> Result<Request> {
        self.requests
            .get(&request_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| RequestError::not_found(format!("request {request_id}")))
    }

    async fn directory_path(&self, request_id: RequestId) -> Result<Option<String>> {
        let request = self.get_request(request_id).await?;
        Ok(self.recorded_path(&request))
    }

    async fn delete_checksums(
        &self,
        request_id: RequestId,
        keys: Option<&[String]>,
    ) -> Result<u64> {
        let (district_id, scope) = self.scope_for(request_id)?;
        let mut deleted = 0;
        for upload in self
            .uploads
            .write()
            .iter_mut()
            .filter(|u| Self::in_scope(u, district_id, scope.as_deref()))
        {
            let before = upload.checksums.len();
            match keys {
                Some(keys) => upload.checksums.retain(|k| !keys.contains(k)),
                None => upload.checksums.clear(),
            }
            deleted += (before - upload.checksums.len()) as u64;
        }
        Ok(deleted)
    }

    async fn trigger_rerun(&self, request_id: RequestId) -> Result<u64> {
        let (district_id, scope) = self.scope_for(request_id)?;
        let mut uploads = self.uploads.write();
        match uploads
            .iter_mut()
            .rev()
            .find(|u| Self::in_scope(u, district_id, scope.as_deref()))
        {
            Some(upload) => {
                upload.queue_bumps += 1;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

/// File contents keyed by normalized remote path
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    files: DashMap<String, Vec<u8>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_file(&self, remote_path: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .insert(normalize_remote_path(remote_path), contents.into());
    }

    pub fn contents(&self, remote_path: &str) -> Option<Vec<u8>> {
        self.files
            .get(&normalize_remote_path(remote_path))
            .map(|c| c.value().clone())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FileStoreGateway for InMemoryFileStore {
    async fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let contents = self
            .contents(remote_path)
            .ok_or_else(|| RequestError::not_found(remote_path.to_string()))?;
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &contents).await?;
        Ok(contents.len() as u64)
    }

    async fn put(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let contents = tokio::fs::read(local_path).await?;
        self.insert_file(remote_path, contents);
        Ok(())
    }

    async fn exists(&self, remote_path: &str) -> Result<bool> {
        Ok(self.files.contains_key(&normalize_remote_path(remote_path)))
    }

    async fn list(&self, remote_dir: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", normalize_remote_path(remote_dir).trim_end_matches('/'));
        let mut found_dir = false;
        let mut names: Vec<String> = Vec::new();
        for entry in self.files.iter() {
            if let Some(rest) = entry.key().strip_prefix(&prefix) {
                found_dir = true;
                if !rest.contains('/') {
                    names.push(rest.to_string());
                }
            }
        }
        if !found_dir {
            return Err(RequestError::not_found(remote_dir.to_string()));
        }
        names.sort();
        Ok(names)
    }
}
