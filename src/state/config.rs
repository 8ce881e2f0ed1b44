use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::error::StorageError;
use crate::region::DEFAULT_REGIONS;

/// Settings for opening a store and driving its dashboard.
///
/// Every field has a default, so hosts only need to set what they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file holding the snapshot slot
    pub db_path: PathBuf,
    /// Key of the single snapshot slot
    pub snapshot_key: String,
    /// Period of the defensive dashboard refresh
    pub refresh_interval_secs: u64,
    /// Window of the "recently collected" table
    pub recent_window_days: i64,
    /// Top-level regions reported individually; the rest go to `Other`
    pub known_regions: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: Self::default_db_path().unwrap_or_else(|_| PathBuf::from("pinboard.db")),
            snapshot_key: "trashReports".to_string(),
            refresh_interval_secs: 5,
            recent_window_days: 7,
            known_regions: DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl StoreConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get the path where the database should be stored
    ///
    /// - Linux: ~/.local/share/pinboard/pinboard.db
    /// - macOS: ~/Library/Application Support/pinboard/pinboard.db
    /// - Windows: %APPDATA%\pinboard\pinboard.db
    pub fn default_db_path() -> Result<PathBuf, StorageError> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(StorageError::NoDataDir)?;

        path.push("pinboard");
        path.push("pinboard.db");
        Ok(path)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.snapshot_key, "trashReports");
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.recent_window_days, 7);
        assert_eq!(config.known_regions, vec!["제주시".to_string(), "서귀포시".to_string()]);
    }

    #[test]
    fn test_from_json_partial() {
        let config = StoreConfig::from_json(
            r#"{ "snapshot_key": "imery-works", "refresh_interval_secs": 0 }"#,
        )
        .unwrap();
        assert_eq!(config.snapshot_key, "imery-works");
        assert_eq!(config.recent_window_days, 7);
        // Zero would spin the refresh loop
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }
}
