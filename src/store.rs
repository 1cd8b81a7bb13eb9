//! Local persistence for tracker state and connection settings.
//!
//! Two JSON documents live under the data directory (default `~/.brewgoal`):
//! `state.json` for the tracker state and `settings.json` for the connection
//! settings. The settings file is the only place the access token is ever
//! written.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::settings::ConnectionSettings;
use crate::tracker::TrackerState;

const STATE_FILE: &str = "state.json";
const SETTINGS_FILE: &str = "settings.json";

/// File-backed key-value store scoped to one data directory.
#[derive(Clone)]
pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `data_dir`, defaulting to `~/.brewgoal`.
    /// The directory is created if it does not exist.
    pub fn new(data_dir: Option<String>) -> Result<Self> {
        let base_dir = match data_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".brewgoal"),
        };

        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", base_dir))?;

        Ok(Self { base_dir })
    }

    pub fn state_path(&self) -> PathBuf {
        self.base_dir.join(STATE_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.base_dir.join(SETTINGS_FILE)
    }

    pub fn load_state(&self) -> Result<TrackerState> {
        self.load_json(&self.state_path(), "tracker state")
    }

    pub fn save_state(&self, state: &TrackerState) -> Result<()> {
        self.save_json(&self.state_path(), state, "tracker state")
    }

    pub fn load_settings(&self) -> Result<ConnectionSettings> {
        self.load_json(&self.settings_path(), "settings")
    }

    pub fn save_settings(&self, settings: &ConnectionSettings) -> Result<()> {
        self.save_json(&self.settings_path(), settings, "settings")
    }

    fn load_json<T>(&self, path: &Path, what: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if !path.exists() {
            debug!("No {} file at {:?}, using defaults", what, path);
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {} from {:?}", what, path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {} from {:?}", what, path))
    }

    fn save_json<T: serde::Serialize>(&self, path: &Path, value: &T, what: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {}", what))?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {} to {:?}", what, path))?;
        debug!("Saved {} to {:?}", what, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> LocalStore {
        LocalStore::new(Some(dir.to_string_lossy().to_string())).unwrap()
    }

    #[test]
    fn missing_files_load_as_defaults() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());

        assert_eq!(store.load_state().unwrap(), TrackerState::default());
        assert_eq!(store.load_settings().unwrap(), ConnectionSettings::default());
    }

    #[test]
    fn state_round_trips() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());

        let state = TrackerState::from_history(vec![50.0, 70.5]);
        store.save_state(&state).unwrap();
        assert_eq!(store.load_state().unwrap(), state);
    }

    #[test]
    fn settings_round_trip_including_token() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());

        let mut settings = ConnectionSettings::default();
        settings.owner = "alice".into();
        settings.repo = "brew-goal".into();
        settings.token = Some("ghp_secret".into());
        store.save_settings(&settings).unwrap();

        let loaded = store.load_settings().unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.token.as_deref(), Some("ghp_secret"));
    }

    #[test]
    fn corrupt_state_file_is_an_error_not_a_default() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());

        std::fs::write(store.state_path(), "{not json").unwrap();
        assert!(store.load_state().is_err());
    }
}
