//! Data model for the prompt history log.

use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::HistoryItemId;

/// Version written into the export envelope.
pub const HISTORY_EXPORT_VERSION: u32 = 1;

/// One entered prompt, one JSON object per history log line.
///
/// Items are conceptually immutable once written: removal only ever takes an
/// item out of the in-memory hot window, never out of the on-disk log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: HistoryItemId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl HistoryItem {
    /// Create a new item with a fresh id and the current time. `text` must
    /// already be trimmed and non-empty; the write boundary enforces that.
    pub fn new(text: String, app_name: Option<String>, directory: Option<PathBuf>) -> Self {
        Self {
            id: HistoryItemId::new(),
            text,
            timestamp: Utc::now(),
            app_name,
            directory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_items: u64,
    pub total_characters: u64,
    pub average_length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_timestamp: Option<DateTime<Utc>>,
}

/// Envelope produced by a full history export and consumed by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryExport {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub stats: HistoryStats,
    pub items: Vec<HistoryItem>,
}
