//! Backward chunked reads of the last N lines of a file.
//!
//! Reads fixed-size blocks from the end of the file toward the start,
//! carrying the partial first fragment of each block into the next (earlier)
//! block, so the whole file never has to be loaded. Splitting happens on raw
//! bytes; only complete lines are decoded, so multi-byte characters crossing
//! a block boundary stay intact.

use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

/// Block size for backward reads.
pub const TAIL_CHUNK_SIZE: usize = 8 * 1024;

/// Return up to `max_lines` non-empty trimmed lines from the end of `path`,
/// in original file order. An empty or missing-lines file yields an empty
/// vec; a file with fewer than `max_lines` lines yields all of them.
pub fn read_last_lines(path: &Path, max_lines: usize) -> io::Result<Vec<String>> {
    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 || max_lines == 0 {
        return Ok(Vec::new());
    }

    // Collected newest-first, reversed to file order before returning.
    let mut collected: Vec<String> = Vec::new();
    let mut remainder: Vec<u8> = Vec::new();
    let mut pos = len;

    while pos > 0 && collected.len() < max_lines {
        let read_size = TAIL_CHUNK_SIZE.min(pos as usize);
        pos -= read_size as u64;
        file.seek(SeekFrom::Start(pos))?;

        let mut chunk = vec![0u8; read_size];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&remainder);

        let mut fragments: Vec<&[u8]> = chunk.split(|byte| *byte == b'\n').collect();
        let carried = if pos > 0 {
            // The first fragment may be the tail of a line that continues
            // into the previous (earlier) block.
            fragments.remove(0).to_vec()
        } else {
            Vec::new()
        };

        for fragment in fragments.iter().rev() {
            let line = String::from_utf8_lossy(fragment);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            collected.push(trimmed.to_string());
            if collected.len() == max_lines {
                break;
            }
        }

        remainder = carried;
    }

    collected.truncate(max_lines);
    collected.reverse();
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn write_lines(lines: &[String]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        let mut contents = lines.join("\n");
        contents.push('\n');
        std::fs::write(&path, contents).expect("write lines");
        (dir, path)
    }

    #[test]
    fn empty_file_yields_no_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.jsonl");
        std::fs::write(&path, "").expect("write");

        assert_eq!(read_last_lines(&path, 5).expect("read"), Vec::<String>::new());
    }

    #[test]
    fn zero_requested_lines_yields_no_lines() {
        let (_dir, path) = write_lines(&["one".to_string()]);
        assert_eq!(read_last_lines(&path, 0).expect("read"), Vec::<String>::new());
    }

    #[test]
    fn returns_exactly_the_last_k_lines_in_order() {
        let lines: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        let (_dir, path) = write_lines(&lines);

        let tail = read_last_lines(&path, 3).expect("read");
        assert_eq!(tail, vec!["line 7", "line 8", "line 9"]);
    }

    #[test]
    fn short_file_returns_all_lines() {
        let lines: Vec<String> = (0..4).map(|i| format!("line {i}")).collect();
        let (_dir, path) = write_lines(&lines);

        let tail = read_last_lines(&path, 100).expect("read");
        assert_eq!(tail, lines);
    }

    #[test]
    fn skips_blank_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "one\n\n  \ntwo\n\n").expect("write");

        let tail = read_last_lines(&path, 10).expect("read");
        assert_eq!(tail, vec!["one", "two"]);
    }

    #[test]
    fn handles_missing_trailing_newline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "one\ntwo\nthree").expect("write");

        let tail = read_last_lines(&path, 2).expect("read");
        assert_eq!(tail, vec!["two", "three"]);
    }

    #[test]
    fn lines_spanning_chunk_boundaries_stay_intact() {
        // Each line is far from dividing 8 KiB evenly, so several block
        // boundaries fall mid-line.
        let lines: Vec<String> = (0..40)
            .map(|i| format!("{i:04}:{}", "x".repeat(700 + i)))
            .collect();
        let (_dir, path) = write_lines(&lines);

        let tail = read_last_lines(&path, 25).expect("read");
        assert_eq!(tail.len(), 25);
        assert_eq!(tail, lines[15..].to_vec());
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let lines: Vec<String> = (0..30).map(|i| format!("{i:04}:{}", "é".repeat(500))).collect();
        let (_dir, path) = write_lines(&lines);

        let tail = read_last_lines(&path, 10).expect("read");
        assert_eq!(tail, lines[20..].to_vec());
    }

    #[test]
    fn file_larger_than_many_chunks_returns_exact_tail() {
        let lines: Vec<String> = (0..5000).map(|i| format!("record-{i}")).collect();
        let (_dir, path) = write_lines(&lines);

        let tail = read_last_lines(&path, 100).expect("read");
        assert_eq!(tail.len(), 100);
        assert_eq!(tail.first().map(String::as_str), Some("record-4900"));
        assert_eq!(tail.last().map(String::as_str), Some("record-4999"));
    }
}
