//! Streaming JSONL helpers shared by the file cache and the history log.
//!
//! Files are read and written one JSON object per line so large listings
//! never have to be materialized as a single JSON array in memory.

use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::ErrorKind;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::atomic_write::set_owner_only;

/// Read every line as a `T`, failing on the first malformed line.
///
/// A missing file is an error here; callers that treat absence as a cache
/// miss check for `NotFound` themselves.
pub fn read_jsonl_strict<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let file = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line =
            line.with_context(|| format!("read line {line_number} from {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<T>(&line)
            .with_context(|| format!("parse JSONL line {line_number} in {}", path.display()))?;
        out.push(parsed);
    }

    Ok(out)
}

/// Read every parsable line as a `T`, skipping malformed lines with a debug
/// log. A missing file reads as empty.
pub fn read_jsonl_lenient<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(anyhow::Error::new(err).context(format!("open {}", path.display())));
        }
    };
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read line {} from {}", idx + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(parsed) => out.push(parsed),
            Err(err) => {
                tracing::debug!(
                    "skipping malformed line {} in {}: {err}",
                    idx + 1,
                    path.display()
                );
            }
        }
    }

    Ok(out)
}

/// Fully rewrite `path` with one JSON object per item, streamed through a
/// temp file in the same directory and atomically persisted (owner
/// read/write only on Unix).
pub fn write_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    let Some(parent) = path.parent() else {
        anyhow::bail!("invalid path for JSONL write: {}", path.display());
    };
    std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;

    let tmp = NamedTempFile::new_in(parent).context("create temp file")?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        for item in items {
            let json = serde_json::to_string(item).context("serialize JSONL record")?;
            writer.write_all(json.as_bytes()).context("write record")?;
            writer.write_all(b"\n").context("write newline")?;
        }
        writer.flush().context("flush temp file")?;
    }
    set_owner_only(tmp.as_file()).context("restrict temp file permissions")?;

    tmp.persist(path).map_err(|err| {
        anyhow::Error::new(err.error).context(format!("persist file to {}", path.display()))
    })?;

    Ok(())
}

/// Append items as newline-joined JSON records in a single write.
pub fn append_jsonl_lines<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let Some(parent) = path.parent() else {
        anyhow::bail!("invalid path for JSONL append: {}", path.display());
    };
    std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;

    let mut batch = String::new();
    for item in items {
        let json = serde_json::to_string(item).context("serialize JSONL record")?;
        batch.push_str(&json);
        batch.push('\n');
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(batch.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    file.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}
