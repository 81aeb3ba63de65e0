//! JSON file persistence for presets and previously opened folders.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::app::presets::{PresetMap, PresetStore};
use crate::domain::errors::Notice;

/// Everything persisted in the state file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Preset maps keyed by project id or the global key.
    #[serde(default)]
    pub presets: BTreeMap<String, PresetMap>,
    #[serde(default)]
    pub folders: Vec<FolderHandle>,
}

/// A local folder the user opened before.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderHandle {
    pub label: String,
    pub path: PathBuf,
    /// RFC 3339 timestamp of the last time the folder was opened.
    pub last_opened: String,
}

/// State file adapter. Every call reads and writes the whole file.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the persisted state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state, empty when the file does not exist yet.
    pub fn load(&self) -> Result<StateSnapshot> {
        if !self.path.exists() {
            return Ok(StateSnapshot::default());
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read state file at {}", self.path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid state data in {}", self.path.display()))
    }

    /// Persist the snapshot, creating parent directories as needed.
    pub fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create state directory {}", dir.display()))?;
        }

        let data =
            serde_json::to_string_pretty(snapshot).context("failed to serialize state snapshot")?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write state file to {}", self.path.display()))
    }

    /// Record that `folder` was opened, replacing any handle with the same label.
    pub fn remember_folder(&self, label: &str, folder: &Path, at: OffsetDateTime) -> Result<()> {
        let mut state = self.load()?;
        state.folders.retain(|handle| handle.label != label);
        state.folders.push(FolderHandle {
            label: label.to_owned(),
            path: folder.to_path_buf(),
            last_opened: at.format(&Rfc3339).context("failed to format timestamp")?,
        });
        state.folders.sort_by(|a, b| a.label.cmp(&b.label));
        self.save(&state)
    }

    pub fn folders(&self) -> Result<Vec<FolderHandle>> {
        Ok(self.load()?.folders)
    }

    /// Resolve a remembered folder. A folder that is gone or unreadable is purged and reported
    /// as [`Notice::StaleHandle`].
    pub fn reopen_folder(&self, label: &str) -> Result<PathBuf> {
        let mut state = self.load()?;
        let Some(index) = state.folders.iter().position(|handle| handle.label == label) else {
            bail!("no remembered folder named '{label}'");
        };

        let path = state.folders[index].path.clone();
        if fs::read_dir(&path).is_ok() {
            return Ok(path);
        }

        tracing::warn!(label, path = %path.display(), "purging stale folder handle");
        state.folders.remove(index);
        self.save(&state)?;
        Err(Notice::StaleHandle(label.to_owned()).into())
    }
}

impl PresetStore for JsonStateStore {
    fn get(&self, key: &str) -> Result<PresetMap> {
        Ok(self.load()?.presets.remove(key).unwrap_or_default())
    }

    fn set(&mut self, key: &str, presets: PresetMap) -> Result<()> {
        let mut state = self.load()?;
        if presets.is_empty() {
            state.presets.remove(key);
        } else {
            state.presets.insert(key.to_owned(), presets);
        }
        self.save(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::datetime;

    use crate::app::presets::GLOBAL_PRESET_KEY;

    #[test]
    fn missing_file_loads_empty_state() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store = JsonStateStore::new(temp.path().join("state.json"));
        assert_eq!(store.load()?, StateSnapshot::default());
        Ok(())
    }

    #[test]
    fn presets_round_trip_through_the_file() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested/state.json");
        let mut store = JsonStateStore::new(&path);

        let mut presets = PresetMap::new();
        presets.insert("api".into(), vec!["src/api.rs".into()]);
        store.set(GLOBAL_PRESET_KEY, presets.clone())?;

        let reopened = JsonStateStore::new(&path);
        assert_eq!(reopened.get(GLOBAL_PRESET_KEY)?, presets);
        assert!(reopened.get("other-project")?.is_empty());
        Ok(())
    }

    #[test]
    fn stale_folder_handle_is_purged() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store = JsonStateStore::new(temp.path().join("state.json"));
        let live = temp.path().join("live");
        fs::create_dir_all(&live)?;
        let gone = temp.path().join("gone");

        let at = datetime!(2024-06-01 12:00 UTC);
        store.remember_folder("live", &live, at)?;
        store.remember_folder("gone", &gone, at)?;

        assert_eq!(store.reopen_folder("live")?, live);
        let err = store.reopen_folder("gone").unwrap_err();
        assert_eq!(
            err.downcast_ref::<Notice>(),
            Some(&Notice::StaleHandle("gone".into()))
        );

        let labels: Vec<String> = store.folders()?.into_iter().map(|h| h.label).collect();
        assert_eq!(labels, vec!["live"]);
        Ok(())
    }

    #[test]
    fn corrupt_state_file_is_an_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("state.json");
        fs::write(&path, "{ not json")?;
        assert!(JsonStateStore::new(&path).load().is_err());
        Ok(())
    }
}
