use std::path::Path;

/// Map an absolute directory path to a filesystem-safe cache entry name by
/// replacing every `/` with `-`.
///
/// Literal dashes in the original path are not escaped, so two paths that
/// differ only by swapping a `/` for a `-` encode to the same name. For a
/// single-user cache keyed by real directories the ambiguity has not been a
/// problem in practice; a collision merely means two directories share a
/// cache slot.
pub fn encode_directory_name(directory: &Path) -> String {
    directory.to_string_lossy().replace('/', "-")
}
