use crate::models::Settings;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Reads settings from a JSON file, falling back to defaults when the file
/// does not exist yet. Unknown or missing fields fall back field-by-field
/// via serde defaults.
pub fn load(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let bytes =
        fs::read(path).with_context(|| format!("Failed to read settings {}", path.display()))?;
    let settings = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse settings {}", path.display()))?;
    Ok(settings)
}

/// Writes settings atomically: a temp file is synced and renamed over the
/// target so a crash mid-write never leaves a truncated file.
pub fn store(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create settings dir {}", parent.display()))?;
    }

    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp)
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    serde_json::to_writer_pretty(&mut file, settings).context("Failed to serialize settings")?;
    file.write_all(b"\n")
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", tmp.display()))?;

    let _ = fs::remove_file(path);
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace settings {}", path.display()))?;
    Ok(())
}
