//! Data model for cached directory listings.
//!
//! `FileEntry` is the rich in-memory record handed over by the native
//! directory scanner. `CachedFileEntry` is its compact on-disk projection,
//! stored one JSON object per line in `files.jsonl`. The two conversions are
//! pure and inverse of each other (up to sub-millisecond timestamp
//! precision, which the compact row does not retain).

use std::path::PathBuf;

use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Version written into `metadata.json`. Bump when the on-disk layout of a
/// cache entry changes incompatibly.
pub const FILE_CACHE_VERSION: u32 = 1;

/// Version written into `global-metadata.json`.
pub const GLOBAL_INDEX_VERSION: u32 = 1;

/// Validity window applied when neither the caller nor the metadata
/// specifies one.
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

/// How the scanner produced a file listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Full recursive walk of the directory tree.
    #[default]
    Recursive,
    /// Only the immediate children of the directory.
    Shallow,
}

/// A single record from the native directory scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: PathBuf,
    pub name: String,
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// Compact on-disk row for one file, one JSON object per `files.jsonl` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedFileEntry {
    pub path: PathBuf,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime_epoch_millis: Option<i64>,
}

impl CachedFileEntry {
    pub fn from_entry(entry: &FileEntry) -> Self {
        Self {
            path: entry.path.clone(),
            name: entry.name.clone(),
            kind: if entry.is_directory {
                FileKind::Directory
            } else {
                FileKind::File
            },
            size: entry.size,
            mtime_epoch_millis: entry.modified_at.map(|t| t.timestamp_millis()),
        }
    }

    pub fn into_entry(self) -> FileEntry {
        FileEntry {
            path: self.path,
            name: self.name,
            is_directory: matches!(self.kind, FileKind::Directory),
            size: self.size,
            modified_at: self
                .mtime_epoch_millis
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        }
    }
}

/// Metadata sidecar for one cached directory, rewritten in full on every
/// save. The timestamp-touch path rewrites only `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCacheMetadata {
    pub version: u32,
    pub directory: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub file_count: usize,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    pub search_mode: SearchMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitignore_respected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentDirectory {
    pub directory: PathBuf,
    pub last_used_at: DateTime<Utc>,
}

/// Singleton index tracking the last-used directory and a capped MRU list
/// of recently cached directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalCacheIndex {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recent_directories: Vec<RecentDirectory>,
}

impl GlobalCacheIndex {
    pub fn empty() -> Self {
        Self {
            version: GLOBAL_INDEX_VERSION,
            last_used_directory: None,
            last_used_at: None,
            recent_directories: Vec::new(),
        }
    }
}

/// A cache hit: the listing plus its metadata, as served to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySnapshot {
    pub directory: PathBuf,
    pub files: Vec<FileEntry>,
    pub metadata: FileCacheMetadata,
}

/// Response shape handed to downstream UI collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    pub success: bool,
    pub files: Vec<FileEntry>,
    pub file_count: usize,
    pub from_cache: bool,
    /// Age of the served cache in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_age: Option<u64>,
    pub search_mode: SearchMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_disabled_reason: Option<String>,
}

impl FileListResponse {
    /// Response for a directory where caching (and file search) is disabled.
    pub fn disabled(reason: &str) -> Self {
        Self {
            success: true,
            files: Vec::new(),
            file_count: 0,
            from_cache: false,
            cache_age: None,
            search_mode: SearchMode::default(),
            files_disabled: Some(true),
            files_disabled_reason: Some(reason.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_entry() -> FileEntry {
        FileEntry {
            path: PathBuf::from("/home/user/project/src/main.rs"),
            name: "main.rs".to_string(),
            is_directory: false,
            size: Some(1234),
            modified_at: Utc.timestamp_millis_opt(1_700_000_000_000).single(),
        }
    }

    #[test]
    fn cached_entry_round_trips_through_entry() {
        let entry = sample_entry();
        let cached = CachedFileEntry::from_entry(&entry);
        assert_eq!(cached.into_entry(), entry);
    }

    #[test]
    fn cached_entry_serializes_with_wire_field_names() {
        let cached = CachedFileEntry::from_entry(&sample_entry());
        let json = serde_json::to_value(&cached).expect("serialize");
        assert_eq!(json["type"], "file");
        assert_eq!(json["mtimeEpochMillis"], 1_700_000_000_000_i64);
        assert_eq!(json["name"], "main.rs");
    }

    #[test]
    fn directory_kind_maps_to_is_directory() {
        let dir = FileEntry {
            path: PathBuf::from("/home/user/project/src"),
            name: "src".to_string(),
            is_directory: true,
            size: None,
            modified_at: None,
        };
        let cached = CachedFileEntry::from_entry(&dir);
        assert_eq!(cached.kind, FileKind::Directory);
        assert!(cached.into_entry().is_directory);
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let metadata = FileCacheMetadata {
            version: FILE_CACHE_VERSION,
            directory: PathBuf::from("/home/user/project"),
            created_at: Utc.timestamp_millis_opt(0).single().expect("timestamp"),
            updated_at: Utc.timestamp_millis_opt(0).single().expect("timestamp"),
            file_count: 3,
            ttl_seconds: 3600,
            search_mode: SearchMode::Recursive,
            gitignore_respected: Some(true),
        };
        let json = serde_json::to_value(&metadata).expect("serialize");
        assert_eq!(json["fileCount"], 3);
        assert_eq!(json["ttlSeconds"], 3600);
        assert_eq!(json["searchMode"], "recursive");
        assert_eq!(json["gitignoreRespected"], true);
    }

    #[test]
    fn empty_index_has_no_recent_directories() {
        let index = GlobalCacheIndex::empty();
        assert_eq!(index.version, GLOBAL_INDEX_VERSION);
        assert!(index.recent_directories.is_empty());
        assert_eq!(index.last_used_directory, None);
    }
}
