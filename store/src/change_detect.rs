use std::collections::HashSet;
use std::path::Path;

use promptpad_protocol::file_list::FileEntry;

/// Compare two file listings by path identity, ignoring order and every
/// other attribute. Returns `true` when the path sets differ, i.e. any path
/// was added, removed, or renamed.
pub fn file_lists_differ(previous: &[FileEntry], next: &[FileEntry]) -> bool {
    let previous_paths: HashSet<&Path> = previous.iter().map(|e| e.path.as_path()).collect();
    let next_paths: HashSet<&Path> = next.iter().map(|e| e.path.as_path()).collect();
    previous_paths != next_paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(path: &str) -> FileEntry {
        FileEntry {
            path: PathBuf::from(path),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            is_directory: false,
            size: None,
            modified_at: None,
        }
    }

    #[test]
    fn identical_lists_are_unchanged() {
        let files = vec![entry("/p/a"), entry("/p/b")];
        assert!(!file_lists_differ(&files, &files.clone()));
    }

    #[test]
    fn reordering_is_not_a_change() {
        let previous = vec![entry("/p/a"), entry("/p/b"), entry("/p/c")];
        let next = vec![entry("/p/c"), entry("/p/a"), entry("/p/b")];
        assert!(!file_lists_differ(&previous, &next));
    }

    #[test]
    fn metadata_changes_are_not_a_change() {
        let previous = vec![entry("/p/a")];
        let mut changed = entry("/p/a");
        changed.size = Some(42);
        assert!(!file_lists_differ(&previous, &[changed]));
    }

    #[test]
    fn added_path_is_a_change() {
        let previous = vec![entry("/p/a")];
        let next = vec![entry("/p/a"), entry("/p/b")];
        assert!(file_lists_differ(&previous, &next));
    }

    #[test]
    fn removed_path_is_a_change() {
        let previous = vec![entry("/p/a"), entry("/p/b")];
        let next = vec![entry("/p/a")];
        assert!(file_lists_differ(&previous, &next));
    }

    #[test]
    fn renamed_path_is_a_change() {
        let previous = vec![entry("/p/a")];
        let next = vec![entry("/p/b")];
        assert!(file_lists_differ(&previous, &next));
    }

    #[test]
    fn detection_is_symmetric() {
        let previous = vec![entry("/p/a"), entry("/p/b")];
        let next = vec![entry("/p/a")];
        assert_eq!(
            file_lists_differ(&previous, &next),
            file_lists_differ(&next, &previous)
        );
    }
}
