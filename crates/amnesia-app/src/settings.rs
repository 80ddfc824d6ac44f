//! Persistent settings stored in the config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use amnesia_core::{ApiConfig, DeletionConfig, FetchConfig, UserKeys, Whitelist};
use amnesia_ops::DailySchedule;

/// Everything remembered between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Saved credentials, used to log in without prompting.
    pub keys: Option<UserKeys>,
    /// Items that are never deleted.
    pub whitelist: Whitelist,
    /// Provider connection settings.
    pub api: ApiConfig,
    /// Pagination settings.
    pub fetch: FetchConfig,
    /// Retry, keep and dry-run settings.
    pub deletion: DeletionConfig,
    /// Hour of the day for scheduled runs.
    pub schedule_hour: Option<u32>,
}

impl Settings {
    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("amnesia").join("settings.toml"))
    }

    /// Load settings from disk, or return defaults.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        Self::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable settings");
            Self::default()
        })
    }

    /// Load settings from a specific file.
    ///
    /// Values the config builders would reject are an `InvalidData` error.
    pub fn load_from(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        settings
            .validate()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(settings)
    }

    /// Run the builder checks on every nested config.
    pub fn validate(&self) -> amnesia_core::Result<()> {
        self.api.validate()?;
        self.fetch.validate()?;
        self.deletion.validate()?;
        if let Some(hour) = self.schedule_hour {
            DailySchedule::new(hour)?;
        }
        Ok(())
    }

    /// Save settings to disk.
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "No config directory")
        })?;
        self.save_to(&path)
    }

    /// Save settings to a specific file, creating its directory.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amnesia_core::{ItemId, ItemKind, KeepPolicy, RunMode};
    use std::time::Duration;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = Settings {
            keys: Some(UserKeys::new("ck", "cs", "at", "ts")),
            schedule_hour: Some(4),
            ..Settings::default()
        };
        settings.whitelist.add(ItemKind::Tweet, ItemId(1050118621198921728));
        settings.whitelist.add(ItemKind::Favorite, ItemId(7));
        settings.deletion.run_mode = RunMode::Concurrent;
        settings.deletion.keep = KeepPolicy {
            keep_younger_than: Some(Duration::from_secs(86_400)),
            max_favorites: Some(10),
            max_retweets: None,
        };

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path).unwrap();

        assert_eq!(loaded.keys, settings.keys);
        assert!(loaded.whitelist.is_whitelisted(ItemKind::Tweet, ItemId(1050118621198921728)));
        assert!(loaded.whitelist.is_whitelisted(ItemKind::Favorite, ItemId(7)));
        assert_eq!(loaded.deletion, settings.deletion);
        assert_eq!(loaded.schedule_hour, Some(4));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "schedule_hour = 2\n\n[deletion]\ndry_run = true\n").unwrap();

        let loaded = Settings::load_from(&path).unwrap();

        assert!(loaded.keys.is_none());
        assert!(loaded.deletion.dry_run);
        assert_eq!(loaded.deletion.retry.max_attempts, 3);
        assert_eq!(loaded.fetch.page_size, 200);
        assert_eq!(loaded.api.api_url, "https://api.twitter.com/1.1");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "schedule_hour = \"noon\"").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_rejects_values_the_builders_reject() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        std::fs::write(&path, "[deletion.retry]\nmultiplier = -2.0\n").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("Multiplier"));

        std::fs::write(&path, "[fetch]\npage_size = 0\n").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

        std::fs::write(&path, "schedule_hour = 24\n").unwrap();
        assert!(Settings::load_from(&path).is_err());

        std::fs::write(&path, "[deletion.retry]\nmultiplier = 1.5\n").unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.deletion.retry.multiplier, 1.5);
    }
}
