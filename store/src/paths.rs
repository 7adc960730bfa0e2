use std::io;
use std::path::Path;
use std::path::PathBuf;

/// Directory under the user's home that holds all promptpad state.
pub const PROMPTPAD_HOME_DIR: &str = ".promptpad";

pub fn promptpad_home() -> anyhow::Result<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        anyhow::bail!("cannot determine home directory for promptpad state");
    };
    Ok(home.join(PROMPTPAD_HOME_DIR))
}

pub fn default_cache_root() -> anyhow::Result<PathBuf> {
    Ok(promptpad_home()?.join("file-cache"))
}

pub fn default_history_path() -> anyhow::Result<PathBuf> {
    Ok(promptpad_home()?.join("history.jsonl"))
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(promptpad_home()?.join("config.toml"))
}

/// Create `path` (and any missing parents) as an owner-only directory.
///
/// Permissions are applied on Unix; elsewhere the directory is created with
/// platform defaults.
pub fn ensure_private_dir(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}
