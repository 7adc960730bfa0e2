//! File-backed store handle for the global cache index.
//!
//! The index is a singleton JSON document tracking the last-used directory
//! and a capped MRU list of recently cached directories. Every read and
//! write round-trips through disk; there is no in-memory copy to go stale.

use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use promptpad_protocol::file_list::GlobalCacheIndex;
use promptpad_protocol::file_list::RecentDirectory;

use crate::atomic_write::write_atomic_text;

/// Maximum number of entries kept in the recent-directories MRU list.
pub const MAX_RECENT_DIRECTORIES: usize = 10;

pub const GLOBAL_INDEX_FILENAME: &str = "global-metadata.json";

#[derive(Debug, Clone)]
pub struct GlobalIndexStore {
    path: PathBuf,
}

impl GlobalIndexStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_root(cache_root: &Path) -> Self {
        Self::new(cache_root.join(GLOBAL_INDEX_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index. A missing or unparsable file reads as `None`; this is
    /// never an error because the index is rebuilt on the next save.
    pub fn load(&self) -> Option<GlobalCacheIndex> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::debug!("failed to read {}: {err}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(index) => Some(index),
            Err(err) => {
                tracing::debug!("failed to parse {}: {err}", self.path.display());
                None
            }
        }
    }

    pub fn save(&self, index: &GlobalCacheIndex) -> anyhow::Result<()> {
        let json = serde_json::to_string(index)?;
        write_atomic_text(&self.path, &json)
    }

    pub fn last_used_directory(&self) -> Option<PathBuf> {
        self.load()?.last_used_directory
    }

    pub fn recent_directories(&self) -> Vec<RecentDirectory> {
        self.load().map(|index| index.recent_directories).unwrap_or_default()
    }

    /// Record `directory` as the most recently used one, at the current time.
    pub fn set_last_used(&self, directory: &Path) -> anyhow::Result<()> {
        self.set_last_used_at(directory, Utc::now())
    }

    /// Clock-explicit variant of [`Self::set_last_used`].
    ///
    /// Setting a directory removes any existing occurrence from the MRU list
    /// before prepending, so entries stay unique and ordered newest first.
    pub fn set_last_used_at(&self, directory: &Path, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut index = self.load().unwrap_or_else(GlobalCacheIndex::empty);
        index.last_used_directory = Some(directory.to_path_buf());
        index.last_used_at = Some(now);
        index.recent_directories.retain(|recent| recent.directory != directory);
        index.recent_directories.insert(
            0,
            RecentDirectory {
                directory: directory.to_path_buf(),
                last_used_at: now,
            },
        );
        index.recent_directories.truncate(MAX_RECENT_DIRECTORIES);
        self.save(&index)
    }

    /// Delete the index file. Missing is fine.
    pub fn remove(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("remove {}", self.path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn store_in(dir: &Path) -> GlobalIndexStore {
        GlobalIndexStore::in_root(dir)
    }

    #[test]
    fn missing_index_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        assert_eq!(store.load(), None);
        assert_eq!(store.last_used_directory(), None);
    }

    #[test]
    fn corrupt_index_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        std::fs::write(store.path(), "{not json").expect("write corrupt");

        assert_eq!(store.load(), None);
    }

    #[test]
    fn set_last_used_creates_index_on_first_use() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        store
            .set_last_used(Path::new("/home/user/project"))
            .expect("set last used");

        assert_eq!(
            store.last_used_directory(),
            Some(PathBuf::from("/home/user/project"))
        );
        assert_eq!(store.recent_directories().len(), 1);
    }

    #[test]
    fn recent_list_is_capped_unique_and_mru_ordered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        for i in 0..15 {
            store
                .set_last_used(&PathBuf::from(format!("/dir/{i}")))
                .expect("set last used");
        }
        // Re-set an older entry; it must move to the front, not duplicate.
        store
            .set_last_used(Path::new("/dir/10"))
            .expect("set last used");

        let recent = store.recent_directories();
        assert_eq!(recent.len(), MAX_RECENT_DIRECTORIES);
        assert_eq!(recent[0].directory, PathBuf::from("/dir/10"));

        let mut directories: Vec<_> = recent.iter().map(|r| r.directory.clone()).collect();
        directories.sort();
        directories.dedup();
        assert_eq!(directories.len(), MAX_RECENT_DIRECTORIES);
    }

    #[test]
    fn set_last_used_at_records_the_given_clock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().expect("timestamp");

        store
            .set_last_used_at(Path::new("/home/user/project"), now)
            .expect("set last used");

        let index = store.load().expect("load index");
        assert_eq!(index.last_used_at, Some(now));
        assert_eq!(index.recent_directories[0].last_used_at, now);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        store.remove().expect("remove missing");
        store
            .set_last_used(Path::new("/home/user/project"))
            .expect("set last used");
        store.remove().expect("remove existing");
        assert_eq!(store.load(), None);
    }
}
