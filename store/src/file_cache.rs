//! Per-directory file-listing cache.
//!
//! Each cached directory gets its own subdirectory under the cache root,
//! named by [`crate::path_encode::encode_directory_name`], holding a
//! `metadata.json` sidecar and a `files.jsonl` listing (one compact record
//! per line). Cache writes are an optimization: they are logged and
//! swallowed on failure so a failed save never breaks the caller's file
//! search. Explicit destructive actions (clear, cleanup) propagate errors.

use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use promptpad_protocol::file_list::CachedFileEntry;
use promptpad_protocol::file_list::DEFAULT_TTL_SECONDS;
use promptpad_protocol::file_list::FILE_CACHE_VERSION;
use promptpad_protocol::file_list::FileCacheMetadata;
use promptpad_protocol::file_list::FileEntry;
use promptpad_protocol::file_list::SearchMode;

use crate::atomic_write::write_atomic_text;
use crate::global_index::GlobalIndexStore;
use crate::jsonl;
use crate::path_encode::encode_directory_name;
use crate::paths;

pub const METADATA_FILENAME: &str = "metadata.json";
pub const FILES_FILENAME: &str = "files.jsonl";

/// Caller-provided knobs for a save.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub ttl_seconds: Option<u64>,
    pub search_mode: SearchMode,
    pub gitignore_respected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSummary {
    pub directory: PathBuf,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate over every readable cache entry; corrupt entries are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub cache_count: usize,
    pub total_file_count: u64,
    pub oldest: Option<CacheSummary>,
    pub newest: Option<CacheSummary>,
    pub total_size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct FileCacheStore {
    root: PathBuf,
    index: GlobalIndexStore,
}

impl FileCacheStore {
    pub fn new(root: PathBuf) -> Self {
        let index = GlobalIndexStore::in_root(&root);
        Self { root, index }
    }

    pub fn with_default_root() -> anyhow::Result<Self> {
        Ok(Self::new(paths::default_cache_root()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &GlobalIndexStore {
        &self.index
    }

    /// Create the cache root with owner-only permissions. Idempotent; a
    /// creation failure is fatal for caching and propagates.
    pub fn initialize(&self) -> anyhow::Result<()> {
        paths::ensure_private_dir(&self.root)
            .with_context(|| format!("create cache root {}", self.root.display()))
    }

    fn entry_dir(&self, directory: &Path) -> PathBuf {
        self.root.join(encode_directory_name(directory))
    }

    /// Load the cached listing and metadata for `directory`. Any missing,
    /// unreadable, or unparsable file is a cache miss, never an error.
    pub fn load(&self, directory: &Path) -> Option<(Vec<FileEntry>, FileCacheMetadata)> {
        let entry_dir = self.entry_dir(directory);
        let metadata_path = entry_dir.join(METADATA_FILENAME);

        let metadata_json = match std::fs::read_to_string(&metadata_path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::debug!("failed to read {}: {err}", metadata_path.display());
                return None;
            }
        };
        let metadata: FileCacheMetadata = match serde_json::from_str(&metadata_json) {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::debug!("failed to parse {}: {err}", metadata_path.display());
                return None;
            }
        };

        let files_path = entry_dir.join(FILES_FILENAME);
        let cached: Vec<CachedFileEntry> = match jsonl::read_jsonl_strict(&files_path) {
            Ok(cached) => cached,
            Err(err) => {
                tracing::debug!("treating {} as a cache miss: {err:#}", files_path.display());
                return None;
            }
        };

        let files = cached.into_iter().map(CachedFileEntry::into_entry).collect();
        Some((files, metadata))
    }

    /// TTL check against an explicit clock. A cache recorded with zero files
    /// marks a prior failed scan and is never valid, regardless of age.
    pub fn is_valid_at(
        metadata: &FileCacheMetadata,
        now: DateTime<Utc>,
        ttl_override: Option<u64>,
    ) -> bool {
        if metadata.file_count == 0 {
            return false;
        }
        let ttl_seconds = ttl_override.unwrap_or(metadata.ttl_seconds);
        let age = now.signed_duration_since(metadata.updated_at);
        age < Duration::seconds(ttl_seconds as i64)
    }

    pub fn is_valid(metadata: &FileCacheMetadata, ttl_override: Option<u64>) -> bool {
        Self::is_valid_at(metadata, Utc::now(), ttl_override)
    }

    /// Fully overwrite the cache entry for `directory` and update the global
    /// index's last-used pointer. Failures are logged and swallowed: a cache
    /// write must never fail the caller's primary file-search operation.
    pub fn save(&self, directory: &Path, files: &[FileEntry], options: &SaveOptions) {
        if let Err(err) = self.save_inner(directory, files, options) {
            tracing::warn!("failed to save file cache for {}: {err:#}", directory.display());
        }
        if let Err(err) = self.index.set_last_used(directory) {
            tracing::warn!("failed to update global cache index: {err:#}");
        }
    }

    fn save_inner(
        &self,
        directory: &Path,
        files: &[FileEntry],
        options: &SaveOptions,
    ) -> anyhow::Result<()> {
        let entry_dir = self.entry_dir(directory);
        paths::ensure_private_dir(&entry_dir)
            .with_context(|| format!("create cache entry {}", entry_dir.display()))?;

        let now = Utc::now();
        // A rewrite keeps the original creation time when the entry already
        // exists and is readable.
        let created_at = self
            .load_metadata(directory)
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let metadata = FileCacheMetadata {
            version: FILE_CACHE_VERSION,
            directory: directory.to_path_buf(),
            created_at,
            updated_at: now,
            file_count: files.len(),
            ttl_seconds: options.ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS),
            search_mode: options.search_mode,
            gitignore_respected: options.gitignore_respected,
        };

        let cached: Vec<CachedFileEntry> = files.iter().map(CachedFileEntry::from_entry).collect();
        jsonl::write_jsonl_atomic(&entry_dir.join(FILES_FILENAME), &cached)?;

        let metadata_json = serde_json::to_string(&metadata).context("serialize cache metadata")?;
        write_atomic_text(&entry_dir.join(METADATA_FILENAME), &metadata_json)
    }

    fn load_metadata(&self, directory: &Path) -> Option<FileCacheMetadata> {
        let metadata_path = self.entry_dir(directory).join(METADATA_FILENAME);
        let contents = std::fs::read_to_string(&metadata_path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Rewrite only `updated_at` in the existing metadata, leaving the file
    /// listing untouched. Used after a re-scan found no changes, to extend
    /// validity without rewriting the listing. Failures are swallowed.
    pub fn touch_timestamp(&self, directory: &Path) {
        let Some(mut metadata) = self.load_metadata(directory) else {
            tracing::debug!("no cache metadata to touch for {}", directory.display());
            return;
        };
        metadata.updated_at = Utc::now();

        let metadata_path = self.entry_dir(directory).join(METADATA_FILENAME);
        let result = serde_json::to_string(&metadata)
            .context("serialize cache metadata")
            .and_then(|json| write_atomic_text(&metadata_path, &json));
        if let Err(err) = result {
            tracing::warn!("failed to touch cache for {}: {err:#}", directory.display());
        }
    }

    /// Remove one cache entry. Errors propagate: clearing is an explicit
    /// user action and its failure must be visible.
    pub fn clear(&self, directory: &Path) -> anyhow::Result<()> {
        let entry_dir = self.entry_dir(directory);
        match std::fs::remove_dir_all(&entry_dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(anyhow::Error::new(err).context(format!("remove {}", entry_dir.display())))
            }
        }
    }

    /// Remove every cache entry and the global index.
    pub fn clear_all(&self) -> anyhow::Result<()> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(anyhow::Error::new(err).context(format!("remove {}", self.root.display())))
            }
        }
    }

    fn entry_dirs(&self) -> anyhow::Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(
                    anyhow::Error::new(err).context(format!("read {}", self.root.display()))
                );
            }
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("read {}", self.root.display()))?;
            if entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false) {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    fn read_entry_metadata(entry_dir: &Path) -> Option<FileCacheMetadata> {
        let contents = std::fs::read_to_string(entry_dir.join(METADATA_FILENAME)).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Aggregate counts and sizes over every readable entry. Individually
    /// corrupt entries are skipped so one bad entry cannot hide the rest.
    pub fn stats(&self) -> anyhow::Result<CacheStats> {
        let mut stats = CacheStats::default();

        for entry_dir in self.entry_dirs()? {
            let Some(metadata) = Self::read_entry_metadata(&entry_dir) else {
                tracing::debug!("skipping unreadable cache entry {}", entry_dir.display());
                continue;
            };

            stats.cache_count += 1;
            stats.total_file_count += metadata.file_count as u64;
            for filename in [METADATA_FILENAME, FILES_FILENAME] {
                if let Ok(file_metadata) = std::fs::metadata(entry_dir.join(filename)) {
                    stats.total_size_bytes += file_metadata.len();
                }
            }

            let summary = CacheSummary {
                directory: metadata.directory.clone(),
                updated_at: metadata.updated_at,
            };
            if stats
                .oldest
                .as_ref()
                .is_none_or(|oldest| summary.updated_at < oldest.updated_at)
            {
                stats.oldest = Some(summary.clone());
            }
            if stats
                .newest
                .as_ref()
                .is_none_or(|newest| summary.updated_at > newest.updated_at)
            {
                stats.newest = Some(summary);
            }
        }

        Ok(stats)
    }

    /// Remove every entry whose `updated_at` age exceeds `max_age_days`.
    /// Returns how many entries were removed. Corrupt entries are skipped,
    /// not removed.
    pub fn cleanup_older_than(&self, max_age_days: u64) -> anyhow::Result<usize> {
        self.cleanup_older_than_at(max_age_days, Utc::now())
    }

    pub fn cleanup_older_than_at(
        &self,
        max_age_days: u64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<usize> {
        let max_age = Duration::days(max_age_days as i64);
        let mut removed = 0;

        for entry_dir in self.entry_dirs()? {
            let Some(metadata) = Self::read_entry_metadata(&entry_dir) else {
                tracing::debug!("skipping unreadable cache entry {}", entry_dir.display());
                continue;
            };
            if now.signed_duration_since(metadata.updated_at) <= max_age {
                continue;
            }
            std::fs::remove_dir_all(&entry_dir)
                .with_context(|| format!("remove {}", entry_dir.display()))?;
            removed += 1;
        }

        Ok(removed)
    }

    pub fn last_used_directory(&self) -> Option<PathBuf> {
        self.index.last_used_directory()
    }

    pub fn set_last_used_directory(&self, directory: &Path) -> anyhow::Result<()> {
        self.index.set_last_used(directory)
    }
}
