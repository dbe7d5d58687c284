//! # System Constants
//!
//! Defaults and well-known names shared by the request manager, the
//! configuration layer and the workflow engine.

/// Request status codes as stored in the request catalog
pub mod status {
    /// Request processing failed
    pub const FAILED: i32 = 4;
    /// Request processed successfully
    pub const SUCCEEDED: i32 = 5;

    /// Statuses included in request lookups unless the caller overrides them
    pub const DEFAULT_STATUSES: [i32; 2] = [FAILED, SUCCEEDED];
}

/// Default request type name prefixes targeted by the workflows
pub const DEFAULT_TYPE_NAMES: [&str; 2] = ["SAT", "PSAT"];

/// Concurrency and retry defaults
pub mod defaults {
    pub const DOWNLOAD_MAX_CONCURRENT: usize = 5;
    /// Restores hit the file store twice per item, so they run narrower
    pub const RESTORE_MAX_CONCURRENT: usize = 3;
    pub const RERUN_MAX_CONCURRENT: usize = 5;

    pub const MAX_RETRIES: u32 = 3;
    pub const INITIAL_DELAY_MS: u64 = 1000;
    pub const BACKOFF_FACTOR: f64 = 2.0;
    pub const MAX_DELAY_MS: u64 = 30_000;

    pub const PROCESSED_ROOT: &str = "LinkIt/ETLProcessedFolder/001";
    pub const BACKUP_ROOT: &str = "LinkIt/BackupData/ETLProcessedFolder/001";
    pub const FILE_STORE_HOST: &str = "ftp.linkit.com";
}

/// Extensions restored when a request's whole processed directory is put back
pub const RESTORABLE_EXTENSIONS: [&str; 2] = ["csv", "txt"];

/// Names accepted by `WorkflowEngine::run_workflow`
pub mod workflows {
    pub const DISTRICT_REFRESH: &str = "district_refresh";
    pub const BULK_DOWNLOAD: &str = "bulk_download";
    pub const INTEGRATION_MONITORING: &str = "integration_monitoring";

    pub const ALL: [&str; 3] = [DISTRICT_REFRESH, BULK_DOWNLOAD, INTEGRATION_MONITORING];
}

/// Step names recorded in workflow payloads and logs
pub mod steps {
    pub const FIND_REQUESTS: &str = "find_requests";
    pub const RESTORE_FILES: &str = "restore_files";
    pub const CLEAR_CHECKSUMS: &str = "clear_checksums";
    pub const RERUN_REQUESTS: &str = "rerun_requests";
    pub const DOWNLOAD_FILES: &str = "download_files";
    pub const SUMMARY_REPORT: &str = "summary_report";
    pub const ANALYZE_REQUESTS: &str = "analyze_requests";
}

/// Environment variables read by the credential provider
pub mod env {
    pub const DB_USERNAME: &str = "DB_UID";
    pub const DB_PASSWORD: &str = "DB_PWD";
    pub const FILE_STORE_HOST: &str = "SFTP_HOST";
    pub const FILE_STORE_USERNAME: &str = "SFTP_USER";
    pub const FILE_STORE_PASSWORD: &str = "SFTP_PWD";
}
