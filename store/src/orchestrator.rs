//! Decides when the directory cache is rewritten, merely refreshed, or
//! bypassed entirely, and which directory to serve when the input window is
//! shown.

use std::path::Path;

use promptpad_protocol::file_list::DirectorySnapshot;
use promptpad_protocol::file_list::FileEntry;
use promptpad_protocol::file_list::FileListResponse;
use promptpad_protocol::file_list::SearchMode;

use crate::change_detect::file_lists_differ;
use crate::file_cache::FileCacheStore;
use crate::file_cache::SaveOptions;

/// Directories that are never cached and always report zero files. This is
/// a security boundary: the input window can end up focused over a shell
/// sitting in `/` or an OS-owned tree, and indexing those is never what the
/// user wants.
const CACHE_DENYLIST: &[&str] = &[
    "/",
    "/Applications",
    "/Library",
    "/System",
    "/Volumes",
    "/bin",
    "/boot",
    "/dev",
    "/etc",
    "/lib",
    "/opt",
    "/private",
    "/proc",
    "/sbin",
    "/sys",
    "/tmp",
    "/usr",
    "/var",
];

/// Reason string when `directory` must not be cached, `None` otherwise.
pub fn caching_disabled_reason(directory: &Path) -> Option<String> {
    let normalized = directory.to_string_lossy();
    let normalized = if normalized.len() > 1 {
        normalized.trim_end_matches('/')
    } else {
        normalized.as_ref()
    };
    CACHE_DENYLIST
        .iter()
        .find(|denied| **denied == normalized)
        .map(|denied| format!("file caching is disabled for system directory {denied}"))
}

#[derive(Debug, Clone)]
pub struct CacheOrchestrator {
    cache: FileCacheStore,
}

impl CacheOrchestrator {
    pub fn new(cache: FileCacheStore) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &FileCacheStore {
        &self.cache
    }

    /// Pick the snapshot to show when the input window appears: the saved
    /// directory's cache when valid, else the globally last-used directory's
    /// cache when it differs and is valid. `None` means the caller has to
    /// trigger a live scan.
    pub fn load_for_window_show(&self, saved_directory: Option<&Path>) -> Option<DirectorySnapshot> {
        if let Some(saved) = saved_directory
            && let Some(snapshot) = self.valid_snapshot(saved)
        {
            return Some(snapshot);
        }

        let last_used = self.cache.last_used_directory()?;
        if saved_directory == Some(last_used.as_path()) {
            return None;
        }
        self.valid_snapshot(&last_used)
    }

    fn valid_snapshot(&self, directory: &Path) -> Option<DirectorySnapshot> {
        if caching_disabled_reason(directory).is_some() {
            return None;
        }
        let (files, metadata) = self.cache.load(directory)?;
        if !FileCacheStore::is_valid(&metadata, None) {
            return None;
        }
        Some(DirectorySnapshot {
            directory: directory.to_path_buf(),
            files,
            metadata,
        })
    }

    /// Persist a freshly scanned listing: rewrite the entry when the path
    /// set changed, otherwise just extend the existing entry's validity.
    /// Either way the global last-used pointer is updated. Returns whether a
    /// persisted change occurred so the caller can decide whether downstream
    /// consumers need a refresh.
    pub fn reconcile(
        &self,
        directory: &Path,
        new_files: &[FileEntry],
        previous_files: Option<&[FileEntry]>,
        options: &SaveOptions,
    ) -> bool {
        if let Some(reason) = caching_disabled_reason(directory) {
            tracing::debug!("not caching {}: {reason}", directory.display());
            return false;
        }

        let changed = previous_files
            .map(|previous| file_lists_differ(previous, new_files))
            .unwrap_or(true);

        if changed {
            self.cache.save(directory, new_files, options);
        } else {
            self.cache.touch_timestamp(directory);
            if let Err(err) = self.cache.set_last_used_directory(directory) {
                tracing::warn!("failed to update global cache index: {err:#}");
            }
        }

        changed
    }

    /// Downstream-facing snapshot of what the cache can serve for
    /// `directory` right now, in the response shape UI collaborators
    /// consume.
    pub fn cached_response(&self, directory: &Path, ttl_override: Option<u64>) -> FileListResponse {
        if let Some(reason) = caching_disabled_reason(directory) {
            return FileListResponse::disabled(&reason);
        }

        match self.cache.load(directory) {
            Some((files, metadata)) if FileCacheStore::is_valid(&metadata, ttl_override) => {
                let age = chrono::Utc::now().signed_duration_since(metadata.updated_at);
                FileListResponse {
                    success: true,
                    file_count: files.len(),
                    files,
                    from_cache: true,
                    cache_age: Some(age.num_seconds().max(0) as u64),
                    search_mode: metadata.search_mode,
                    files_disabled: None,
                    files_disabled_reason: None,
                }
            }
            _ => FileListResponse {
                success: false,
                files: Vec::new(),
                file_count: 0,
                from_cache: false,
                cache_age: None,
                search_mode: SearchMode::default(),
                files_disabled: None,
                files_disabled_reason: None,
            },
        }
    }
}
