//! Remote path helpers shared by the file-store adapters and the restore flow.

use crate::models::{Request, RequestId};
use std::sync::Arc;

/// Derives the backup-archive path for a request's processed file
pub type BackupPathResolver = Arc<dyn Fn(&Request, &str) -> String + Send + Sync>;

/// Convert a path recorded by the Windows importer into a file-store path
///
/// `F:\FTProot\Districts\123\SAT` and `F:/FTProot/Districts/123/SAT` both
/// become `/Districts/123/SAT`. Paths without a `Districts/` segment keep
/// their shape minus the drive letter.
pub fn db_path_to_remote_path(db_path: &str) -> String {
    let mut path = db_path.trim().replace('\\', "/");

    if path.len() >= 2 && path.as_bytes()[1] == b':' {
        path = path[2..].to_string();
    }
    let trimmed = path.trim_start_matches('/');

    let lowered = trimmed.to_ascii_lowercase();
    let kept = match lowered.find("districts/") {
        Some(idx) => &trimmed[idx..],
        None => trimmed,
    };

    normalize_remote_path(kept)
}

/// Leading slash, forward slashes only, no empty segments
pub fn normalize_remote_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .split(|c: char| c == '/' || c == '\\')
        .filter(|segment| !segment.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

pub fn join_remote(base: &str, segment: &str) -> String {
    normalize_remote_path(&format!("{base}/{segment}"))
}

/// Primary location of a request's processed output
pub fn processed_path(processed_root: &str, request_id: RequestId, file_name: &str) -> String {
    normalize_remote_path(&format!("{processed_root}/{request_id}/{file_name}"))
}

/// Directory part of a recorded path, in its recorded form
///
/// `F:\FTProot\Districts\123\SAT\a.csv` gives `F:\FTProot\Districts\123\SAT`;
/// a bare file name has no directory.
pub fn parent_directory(db_path: &str) -> Option<String> {
    let trimmed = db_path.trim().trim_end_matches(|c: char| c == '/' || c == '\\');
    let idx = trimmed.rfind(|c: char| c == '/' || c == '\\')?;
    let parent = &trimmed[..idx];
    (!parent.is_empty()).then(|| parent.to_string())
}

/// Whether `path` is the upload `directory` itself or lies beneath it
///
/// Comparison ignores case and separator style, matching how the importer
/// records Windows paths.
pub fn directory_covers(directory: &str, path: &str) -> bool {
    let directory = normalize_remote_path(directory).to_ascii_lowercase();
    let path = normalize_remote_path(path).to_ascii_lowercase();
    if directory == "/" {
        return false;
    }
    path == directory || path.starts_with(&format!("{directory}/"))
}

/// `<backup_root>/<request_id>/<file name>`
///
/// Called with an empty file name it yields the request's backup directory.
pub fn default_backup_resolver(backup_root: impl Into<String>) -> BackupPathResolver {
    let backup_root = backup_root.into();
    Arc::new(move |request: &Request, file_name: &str| {
        processed_path(&backup_root, request.request_id, file_name)
    })
}
