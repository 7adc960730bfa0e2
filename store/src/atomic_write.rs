use std::path::Path;

use anyhow::Context;
use tempfile::NamedTempFile;

/// Write `contents` to `path` through a temp file in the same directory so
/// readers never observe a half-written file. The file ends up owner
/// read/write only on Unix.
pub fn write_atomic_text(path: &Path, contents: &str) -> anyhow::Result<()> {
    let Some(parent) = path.parent() else {
        anyhow::bail!("invalid path for atomic write: {}", path.display());
    };
    std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent).context("create temp file")?;
    use std::io::Write as _;
    tmp.write_all(contents.as_bytes())
        .context("write temp file")?;
    if !contents.is_empty() && !contents.ends_with('\n') {
        tmp.write_all(b"\n").context("write temp newline")?;
    }
    tmp.flush().context("flush temp file")?;
    set_owner_only(tmp.as_file()).context("restrict temp file permissions")?;

    tmp.persist(path).map_err(|err| {
        anyhow::Error::new(err.error).context(format!("persist file to {}", path.display()))
    })?;

    Ok(())
}

#[cfg(unix)]
pub(crate) fn set_owner_only(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
pub(crate) fn set_owner_only(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}
