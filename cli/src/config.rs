use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use promptpad_store::atomic_write::write_atomic_text;
use toml_edit::DocumentMut;
use toml_edit::Item as TomlItem;
use toml_edit::Table as TomlTable;
use toml_edit::value;

/// Reader/editor for `~/.promptpad/config.toml`.
///
/// Edits go through `toml_edit` so user comments and formatting survive a
/// rewrite. A missing file reads as all-defaults; an unparsable file reads
/// the same way rather than blocking the tool.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn new_default() -> anyhow::Result<Self> {
        Ok(Self::new(promptpad_store::paths::default_config_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// TTL override for directory caches, `[cache] ttl_seconds`.
    pub fn cache_ttl_seconds(&self) -> anyhow::Result<Option<u64>> {
        let Some(doc) = self.read_document()? else {
            return Ok(None);
        };
        Ok(read_integer(&doc, "cache", "ttl_seconds").and_then(|v| u64::try_from(v).ok()))
    }

    /// Hot window capacity for the history log, `[history] max_items`.
    pub fn history_max_items(&self) -> anyhow::Result<Option<usize>> {
        let Some(doc) = self.read_document()? else {
            return Ok(None);
        };
        Ok(read_integer(&doc, "history", "max_items").and_then(|v| usize::try_from(v).ok()))
    }

    pub fn set_cache_ttl_seconds(&self, seconds: u64) -> anyhow::Result<()> {
        self.set_integer("cache", "ttl_seconds", seconds as i64)
    }

    pub fn set_history_max_items(&self, items: usize) -> anyhow::Result<()> {
        self.set_integer("history", "max_items", items as i64)
    }

    fn set_integer(&self, table: &str, key: &str, integer: i64) -> anyhow::Result<()> {
        let mut doc = match self.read_document()? {
            Some(doc) => doc,
            None => DocumentMut::new(),
        };
        ensure_table_for_write(&mut doc, table)[key] = value(integer);
        write_atomic_text(&self.path, &doc.to_string())
    }

    fn read_document(&self) -> anyhow::Result<Option<DocumentMut>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(anyhow::Error::new(err).context("read config.toml")),
        };
        match contents.parse::<DocumentMut>() {
            Ok(doc) => Ok(Some(doc)),
            Err(err) => {
                tracing::debug!("ignoring unparsable {}: {err}", self.path.display());
                Ok(None)
            }
        }
    }
}

fn read_integer(doc: &DocumentMut, table: &str, key: &str) -> Option<i64> {
    doc.get(table)
        .and_then(TomlItem::as_table)
        .and_then(|table| table.get(key))
        .and_then(TomlItem::as_value)
        .and_then(|v| v.as_integer())
}

fn ensure_table_for_write<'a>(doc: &'a mut DocumentMut, key: &str) -> &'a mut TomlTable {
    if doc.get(key).and_then(TomlItem::as_table).is_none() {
        let mut table = TomlTable::new();
        table.set_implicit(false);
        doc[key] = TomlItem::Table(table);
    }
    match &mut doc[key] {
        TomlItem::Table(table) => table,
        _ => unreachable!("expected `{key}` to be a table"),
    }
}
