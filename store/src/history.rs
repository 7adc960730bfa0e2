//! Append-only prompt history log with a bounded in-memory hot window.
//!
//! Every entered prompt is one JSONL record, oldest first. The hot window
//! keeps the most recent items (newest first, de-duplicated by text) for
//! instant recall; appends are coalesced through a debounced queue so bursts
//! of rapid additions become a single disk write. Reads beyond the window go
//! through [`crate::tail_read`] so the unbounded log never has to be loaded
//! in full, except by the explicit export operation.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use promptpad_protocol::HistoryItemId;
use promptpad_protocol::history::HISTORY_EXPORT_VERSION;
use promptpad_protocol::history::HistoryExport;
use promptpad_protocol::history::HistoryItem;
use promptpad_protocol::history::HistoryStats;
use tokio::task::JoinHandle;

use crate::atomic_write;
use crate::jsonl;
use crate::paths;
use crate::tail_read;

/// Hot window capacity when the caller does not configure one.
pub const DEFAULT_MAX_ITEMS: usize = 100;

/// How long a burst of additions is allowed to coalesce before the queue is
/// flushed to disk.
pub const DEFAULT_FLUSH_DEBOUNCE: Duration = Duration::from_millis(100);

pub const DEFAULT_RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct HistoryLogOptions {
    pub max_items: usize,
    pub flush_debounce: Duration,
}

impl Default for HistoryLogOptions {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            flush_debounce: DEFAULT_FLUSH_DEBOUNCE,
        }
    }
}

/// Handle to the prompt history log. Cheap to clone; all clones share the
/// same hot window, append queue, and background tasks.
#[derive(Clone)]
pub struct HistoryLog {
    inner: Arc<HistoryInner>,
}

struct HistoryInner {
    path: PathBuf,
    max_items: usize,
    flush_debounce: Duration,
    state: Mutex<HistoryState>,
}

#[derive(Default)]
struct HistoryState {
    /// Most recent items, newest first. Never grows past `max_items`.
    window: VecDeque<HistoryItem>,
    /// Texts currently present in the window, for O(1) duplicate checks.
    texts: HashSet<String>,
    /// Items appended since the last flush, oldest first.
    queue: Vec<HistoryItem>,
    debounce: Option<JoinHandle<()>>,
    flush_in_progress: bool,
    reflush_requested: bool,
    /// Exact record count of the on-disk log, once the background scan has
    /// finished. Incremented optimistically on every append afterwards.
    total_items: Option<u64>,
    count_task: Option<JoinHandle<()>>,
}

impl HistoryLog {
    pub async fn open_default(options: HistoryLogOptions) -> anyhow::Result<Self> {
        Self::open(paths::default_history_path()?, options).await
    }

    /// Create the log file if needed, populate the hot window from the tail
    /// of the log, and kick off the background record count. The returned
    /// handle is ready for use immediately; the count catches up on its own.
    pub async fn open(path: PathBuf, options: HistoryLogOptions) -> anyhow::Result<Self> {
        let Some(parent) = path.parent() else {
            anyhow::bail!("invalid history log path: {}", path.display());
        };
        paths::ensure_private_dir(parent)
            .with_context(|| format!("create {}", parent.display()))?;

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("create {}", path.display()))?;
        atomic_write::set_owner_only(&file)
            .with_context(|| format!("restrict permissions on {}", path.display()))?;
        drop(file);

        let max_items = options.max_items.max(1);
        let mut state = HistoryState::default();
        populate_window(&mut state, &path, max_items)?;

        let log = Self {
            inner: Arc::new(HistoryInner {
                path,
                max_items,
                flush_debounce: options.flush_debounce,
                state: Mutex::new(state),
            }),
        };
        log.spawn_count_task();
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Record an entered prompt. Returns `None` when `text` trims to empty.
    ///
    /// Adding text already present in the hot window moves the existing item
    /// to the front with a refreshed timestamp and metadata instead of
    /// creating a new record; nothing is written to disk in that case. A new
    /// item is queued for a debounced append, and the oldest window entry is
    /// evicted (from the window only) once capacity is exceeded.
    ///
    /// Must be called from within a tokio runtime; the debounced flush runs
    /// as a spawned task.
    pub fn add_to_history(
        &self,
        text: &str,
        app_name: Option<String>,
        directory: Option<PathBuf>,
    ) -> Option<HistoryItem> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let item = {
            let mut state = self.inner.lock_state();

            if state.texts.contains(text) {
                let position = state.window.iter().position(|item| item.text == text);
                if let Some(position) = position
                    && let Some(mut existing) = state.window.remove(position)
                {
                    existing.timestamp = Utc::now();
                    existing.app_name = app_name;
                    existing.directory = directory;
                    state.window.push_front(existing.clone());
                    return Some(existing);
                }
                // The duplicate index and window disagree; fall through and
                // treat the text as new.
                state.texts.remove(text);
            }

            let item = HistoryItem::new(text.to_string(), app_name, directory);
            state.texts.insert(item.text.clone());
            state.window.push_front(item.clone());
            if state.window.len() > self.inner.max_items
                && let Some(evicted) = state.window.pop_back()
            {
                state.texts.remove(&evicted.text);
            }

            state.queue.push(item.clone());
            if let Some(total) = state.total_items.as_mut() {
                *total += 1;
            }
            item
        };

        self.schedule_flush();
        Some(item)
    }

    fn schedule_flush(&self) {
        let inner = Arc::clone(&self.inner);
        let delay = self.inner.flush_debounce;
        let mut state = self.inner.lock_state();
        // Each new addition resets the timer so a burst coalesces into one
        // write.
        if let Some(pending) = state.debounce.take() {
            pending.abort();
        }
        state.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = HistoryInner::flush(&inner).await {
                tracing::warn!("debounced history flush failed: {err:#}");
            }
        }));
    }

    /// Write all queued items to the log now. On failure the items are put
    /// back at the front of the queue and the error is re-raised: losing a
    /// user's typed text silently is not acceptable.
    pub async fn flush(&self) -> anyhow::Result<()> {
        HistoryInner::flush(&self.inner).await
    }

    /// Copy of the hot window, newest first, optionally limited.
    pub fn history(&self, limit: Option<usize>) -> Vec<HistoryItem> {
        let state = self.inner.lock_state();
        let take = limit.unwrap_or(self.inner.max_items).min(self.inner.max_items);
        state.window.iter().take(take).cloned().collect()
    }

    /// Hot-window-only lookup; never scans the log for a single id.
    pub fn history_item(&self, id: HistoryItemId) -> Option<HistoryItem> {
        let state = self.inner.lock_state();
        state.window.iter().find(|item| item.id == id).cloned()
    }

    pub fn recent_history(&self, limit: usize) -> Vec<HistoryItem> {
        self.history(Some(limit))
    }

    /// Up to `limit` items newest first, reading past the hot window from
    /// the tail of the log when necessary. Read errors degrade to the hot
    /// window instead of failing.
    pub async fn history_for_search(&self, limit: usize) -> Vec<HistoryItem> {
        {
            let state = self.inner.lock_state();
            if limit <= state.window.len() {
                return state.window.iter().take(limit).cloned().collect();
            }
        }

        // Queued items are only visible on disk; push them out first.
        if let Err(err) = self.flush().await {
            tracing::warn!("flush before history read failed: {err:#}");
        }

        match read_tail_items(&self.inner.path, limit) {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(
                    "tail read of {} failed, serving hot window: {err:#}",
                    self.inner.path.display()
                );
                let state = self.inner.lock_state();
                state.window.iter().cloned().collect()
            }
        }
    }

    /// Case-insensitive substring search over the hot window only.
    pub fn search_history(&self, query: &str, limit: usize) -> Vec<HistoryItem> {
        let needle = query.to_lowercase();
        let state = self.inner.lock_state();
        state
            .window
            .iter()
            .filter(|item| item.text.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Remove an item from the hot window and duplicate index. The on-disk
    /// log is never rewritten; committed history outlives window removal.
    pub fn remove_history_item(&self, id: HistoryItemId) -> bool {
        let mut state = self.inner.lock_state();
        let Some(position) = state.window.iter().position(|item| item.id == id) else {
            return false;
        };
        if let Some(removed) = state.window.remove(position) {
            state.texts.remove(&removed.text);
            return true;
        }
        false
    }

    /// Flush anything pending, then empty the hot window and duplicate
    /// index. The log file is left untouched.
    pub async fn clear_history(&self) -> anyhow::Result<()> {
        self.flush().await?;
        let mut state = self.inner.lock_state();
        state.window.clear();
        state.texts.clear();
        Ok(())
    }

    /// Stats over the hot window, with `total_items` taken from the exact
    /// background count once it is available. Triggers the count lazily when
    /// it has not run yet.
    pub fn stats(&self) -> HistoryStats {
        let stats = {
            let state = self.inner.lock_state();
            let total_characters: u64 = state
                .window
                .iter()
                .map(|item| item.text.chars().count() as u64)
                .sum();
            let average_length = if state.window.is_empty() {
                0.0
            } else {
                total_characters as f64 / state.window.len() as f64
            };
            HistoryStats {
                total_items: state.total_items.unwrap_or(state.window.len() as u64),
                total_characters,
                average_length,
                oldest_timestamp: state.window.back().map(|item| item.timestamp),
                newest_timestamp: state.window.front().map(|item| item.timestamp),
            }
        };
        self.spawn_count_task();
        stats
    }

    /// Stream the entire log, validate every record, and return the full
    /// list sorted newest first, together with current stats. This is the
    /// one operation allowed to read the whole file; it backs an explicit,
    /// infrequent user action.
    pub async fn export_history(&self) -> anyhow::Result<HistoryExport> {
        self.flush().await?;

        let path = self.inner.path.clone();
        let mut items = tokio::task::spawn_blocking(move || {
            jsonl::read_jsonl_lenient::<HistoryItem>(&path)
        })
        .await
        .context("join export read")??;
        items.retain(|item| !item.text.trim().is_empty());
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(HistoryExport {
            version: HISTORY_EXPORT_VERSION,
            exported_at: Utc::now(),
            stats: self.stats(),
            items,
        })
    }

    /// Append the export's records to the log. With `merge == false` the
    /// current history is cleared first and the log truncated: the one
    /// sanctioned truncation of the file. Afterwards the hot window is
    /// reloaded from the tail and the exact count recomputed. Returns how
    /// many records were imported.
    pub async fn import_history(
        &self,
        export: &HistoryExport,
        merge: bool,
    ) -> anyhow::Result<usize> {
        if export.version != HISTORY_EXPORT_VERSION {
            anyhow::bail!("unsupported history export version {}", export.version);
        }

        // Anything still queued has to reach the log before records are
        // appended behind it.
        self.flush().await?;

        if !merge {
            self.clear_history().await?;
            atomic_write::write_atomic_text(&self.inner.path, "")
                .with_context(|| format!("truncate {}", self.inner.path.display()))?;
        }

        let mut importable: Vec<HistoryItem> = export
            .items
            .iter()
            .filter(|item| !item.text.trim().is_empty())
            .cloned()
            .collect();
        // The log is oldest-first on disk; exports are newest-first.
        importable.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        jsonl::append_jsonl_lines(&self.inner.path, &importable)
            .with_context(|| format!("append imported records to {}", self.inner.path.display()))?;

        let path = self.inner.path.clone();
        let count = tokio::task::spawn_blocking(move || count_log_records(&path))
            .await
            .context("join record count")??;

        let mut state = self.inner.lock_state();
        populate_window(&mut state, &self.inner.path, self.inner.max_items)?;
        state.total_items = Some(count);

        Ok(importable.len())
    }

    /// Cancel the pending debounce, flush the queue, and wait for the
    /// background count to finish. Call on process shutdown so no typed text
    /// is left in memory.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let (debounce, count_task) = {
            let mut state = self.inner.lock_state();
            (state.debounce.take(), state.count_task.take())
        };
        if let Some(pending) = debounce {
            pending.abort();
        }
        self.flush().await?;
        if let Some(task) = count_task {
            // An aborted or panicked count only costs the cached total.
            let _ = task.await;
        }
        Ok(())
    }

    fn spawn_count_task(&self) {
        let mut state = self.inner.lock_state();
        if state.total_items.is_some() {
            return;
        }
        if state.count_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        state.count_task = Some(tokio::spawn(async move {
            let path = inner.path.clone();
            let result = tokio::task::spawn_blocking(move || count_log_records(&path)).await;
            match result {
                Ok(Ok(count)) => {
                    let mut state = inner.lock_state();
                    // Appends that raced the scan already incremented nothing
                    // (the total was unset); only adopt the count if that is
                    // still true.
                    if state.total_items.is_none() {
                        state.total_items = Some(count);
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!("history record count failed: {err:#}");
                }
                Err(err) => {
                    tracing::warn!("history record count task failed: {err}");
                }
            }
        }));
    }
}

impl HistoryInner {
    fn lock_state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn flush(inner: &Arc<Self>) -> anyhow::Result<()> {
        loop {
            let batch = {
                let mut state = inner.lock_state();
                if state.flush_in_progress {
                    // Single flight: the in-progress flush picks this up.
                    state.reflush_requested = true;
                    return Ok(());
                }
                if state.queue.is_empty() {
                    state.reflush_requested = false;
                    return Ok(());
                }
                state.flush_in_progress = true;
                std::mem::take(&mut state.queue)
            };

            let result = jsonl::append_jsonl_lines(&inner.path, &batch);

            let mut state = inner.lock_state();
            state.flush_in_progress = false;
            match result {
                Ok(()) => {
                    if !state.reflush_requested && state.queue.is_empty() {
                        return Ok(());
                    }
                    state.reflush_requested = false;
                    // Items arrived during the write; loop and flush them
                    // too.
                }
                Err(err) => {
                    // At-least-once: restore the batch ahead of anything
                    // queued while the write was failing.
                    let mut restored = batch;
                    restored.append(&mut state.queue);
                    state.queue = restored;
                    return Err(err);
                }
            }
        }
    }
}

/// Rebuild the hot window from the tail of the log: newest first, capped at
/// `max_items`, de-duplicated by text keeping the most recent occurrence.
fn populate_window(
    state: &mut HistoryState,
    path: &Path,
    max_items: usize,
) -> anyhow::Result<()> {
    state.window.clear();
    state.texts.clear();

    let items = read_tail_items(path, max_items)
        .with_context(|| format!("load history tail from {}", path.display()))?;

    // `items` is newest first; walk oldest to newest so later duplicates
    // replace earlier ones.
    for item in items.into_iter().rev() {
        if state.texts.contains(&item.text) {
            if let Some(position) = state.window.iter().position(|w| w.text == item.text) {
                state.window.remove(position);
            }
        } else {
            state.texts.insert(item.text.clone());
        }
        state.window.push_front(item);
    }

    Ok(())
}

/// Read up to `limit` valid records from the end of the log, newest first.
fn read_tail_items(path: &Path, limit: usize) -> anyhow::Result<Vec<HistoryItem>> {
    let lines = tail_read::read_last_lines(path, limit)
        .with_context(|| format!("read tail of {}", path.display()))?;

    let mut items = Vec::with_capacity(lines.len());
    // Newest last in file order; reverse so the newest comes first.
    for line in lines.iter().rev() {
        match serde_json::from_str::<HistoryItem>(line) {
            Ok(item) if !item.text.trim().is_empty() => items.push(item),
            Ok(_) => {}
            Err(err) => {
                tracing::debug!("skipping malformed history record: {err}");
            }
        }
    }
    Ok(items)
}

/// Exact count of valid records in the log. Streams the file; used only off
/// the caller's critical path.
fn count_log_records(path: &Path) -> anyhow::Result<u64> {
    let items: Vec<HistoryItem> = jsonl::read_jsonl_lenient(path)?;
    Ok(items.iter().filter(|item| !item.text.trim().is_empty()).count() as u64)
}
