//! Persisted viewer preferences.
//!
//! A single boolean lives here: the dark-mode flag, stored as JSON under the
//! well-known `dark_mode` key in the user config directory and mirrored to a
//! document-level style hook by the host. Writes go through a temp file and
//! an atomic rename.

use anyhow::{Context, Result};
use doc_model::ThemePreference;
use std::fs;
use std::path::{Path, PathBuf};

/// `$VELLUM_CONFIG_DIR/preferences.json`, falling back to the platform
/// config directory. The env override exists for tests.
pub fn preferences_path() -> Option<PathBuf> {
    let base = match std::env::var_os("VELLUM_CONFIG_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::config_dir()?.join("vellum"),
    };

    Some(base.join("preferences.json"))
}

pub fn load_theme(path: &Path) -> Result<Option<ThemePreference>> {
    if !path.exists() {
        return Ok(None);
    }

    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let preference: ThemePreference = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    Ok(Some(preference))
}

pub fn save_theme(path: &Path, preference: ThemePreference) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(&preference)?;

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, json)
        .with_context(|| format!("failed to write {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to move preferences into {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir().join("vellum-prefs-test");
        let path = dir.join("preferences.json");

        save_theme(&path, ThemePreference { dark_mode: true }).unwrap();
        let loaded = load_theme(&path).unwrap();
        assert_eq!(loaded, Some(ThemePreference { dark_mode: true }));

        save_theme(&path, ThemePreference { dark_mode: false }).unwrap();
        let loaded = load_theme(&path).unwrap();
        assert_eq!(loaded, Some(ThemePreference { dark_mode: false }));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_missing_file_is_none() {
        let path = Path::new("/tmp/vellum-nonexistent/preferences.json");
        assert_eq!(load_theme(path).unwrap(), None);
    }
}
