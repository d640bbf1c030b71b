use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do when two flat keys land on the same path.
///
/// `LastWins` processes entries in sorted key order and lets the later one
/// replace whatever is in its way. `Reject` fails with
/// [`MetadataError::KeyCollision`](crate::error::MetadataError::KeyCollision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    LastWins,
    Reject,
}

/// Configuration for reading and writing PNG metadata.
///
/// # Loading
///
/// ```rust,no_run
/// use pngmeta::config::{CollisionPolicy, Config};
///
/// // From a JSON file
/// let config = Config::load(Some("pngmeta.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.separator = "/".into();
/// config.on_collision = CollisionPolicy::Reject;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Joins nested key segments into a single chunk keyword.
    pub separator: String,
    /// Spaces of indentation in extracted JSON.
    pub indent: usize,
    /// Keep text chunks already in the image unless a new entry rewrites their keyword.
    pub keep_existing: bool,
    pub on_collision: CollisionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            separator: ".".to_string(),
            indent: 4,
            keep_existing: false,
            on_collision: CollisionPolicy::LastWins,
        }
    }
}

impl Config {
    /// Load config from the given path. Without a path the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(config_path) = path else {
            return Ok(Self::default());
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.separator, ".");
        assert_eq!(config.indent, 4);
        assert!(!config.keep_existing);
        assert_eq!(config.on_collision, CollisionPolicy::LastWins);
    }

    #[test]
    fn load_without_path_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.separator, ".");
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(config.indent, 4);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pngmeta.json");
        let config = Config {
            separator: "/".into(),
            indent: 2,
            keep_existing: true,
            on_collision: CollisionPolicy::Reject,
        };
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.separator, "/");
        assert_eq!(loaded.indent, 2);
        assert!(loaded.keep_existing);
        assert_eq!(loaded.on_collision, CollisionPolicy::Reject);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pngmeta.json");
        std::fs::write(&path, r#"{"on_collision": "reject"}"#).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.on_collision, CollisionPolicy::Reject);
        assert_eq!(loaded.separator, ".");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pngmeta.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
