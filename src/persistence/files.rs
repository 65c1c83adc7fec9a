use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Environment variable that pins the data directory
pub const DATA_DIR_ENV: &str = "ROADMAP_TRACKER_DIR";

/// Name of the per-project data directory created by `roadmap init`
pub const LOCAL_DIR_NAME: &str = ".roadmap";

/// Get the data directory - env override first, then a local .roadmap, then the platform data dir
pub fn get_data_dir() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;
    resolve_data_dir(env::var_os(DATA_DIR_ENV).map(PathBuf::from), &current_dir)
}

fn resolve_data_dir(env_override: Option<PathBuf>, current_dir: &Path) -> Result<PathBuf> {
    if let Some(dir) = env_override {
        return Ok(dir);
    }

    if let Some(local_dir) = find_local_dir(current_dir) {
        return Ok(local_dir);
    }

    let base = dirs::data_dir().context("Could not determine platform data directory")?;
    Ok(base.join("roadmap-tracker"))
}

/// Find local .roadmap directory by walking up the directory tree
fn find_local_dir(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let candidate = current.join(LOCAL_DIR_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }

        current = current.parent()?;
    }
}

/// Ensure the data directory exists
pub fn ensure_data_dir() -> Result<PathBuf> {
    let dir = get_data_dir()?;
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(dir)
}

/// Initialize a local .roadmap directory in the current directory
pub fn init_local_dir() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;
    let local_dir = current_dir.join(LOCAL_DIR_NAME);

    if local_dir.exists() {
        anyhow::bail!("Roadmap directory already exists: {}", local_dir.display());
    }

    fs::create_dir_all(&local_dir)
        .with_context(|| format!("Failed to create directory: {}", local_dir.display()))?;

    Ok(local_dir)
}

/// Path to the roadmap document inside `dir`
pub fn roadmap_file(dir: &Path) -> PathBuf {
    dir.join("roadmap.json")
}

/// Path to config.json inside `dir`
pub fn config_file(dir: &Path) -> PathBuf {
    dir.join("config.json")
}

/// Path to the progress report for a date (report-YYYY-MM-DD.md)
pub fn report_file(dir: &Path, date: chrono::NaiveDate) -> PathBuf {
    dir.join(format!("report-{}.md", date.format("%Y-%m-%d")))
}

/// Atomically write content to a file using temp file + rename
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .context("File path has no parent directory")?;

    // Same directory as the target, so the rename never crosses filesystems
    let mut temp_file = NamedTempFile::new_in(dir)
        .context("Failed to create temporary file")?;

    temp_file
        .write_all(content.as_bytes())
        .context("Failed to write to temporary file")?;

    // Flush before the rename so a crash can't leave a truncated target
    temp_file
        .as_file()
        .sync_all()
        .context("Failed to sync temporary file")?;

    // Replace the target in one step; readers see old or new content, never a mix
    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file: {}", path.display()))?;

    Ok(())
}

/// Read file content, return empty string if file doesn't exist
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    // A missing file means nothing saved yet
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}
