//! Named selections saved per project.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, bail};

use crate::app::export::ordered_selected_files;
use crate::app::selection::SelectionManager;
use crate::app::tree::PathTree;

/// Key used when no project is active.
pub const GLOBAL_PRESET_KEY: &str = "__global__";

/// Preset name to the paths it selects.
pub type PresetMap = BTreeMap<String, Vec<String>>;

/// Persistence of preset maps, keyed by project id or [`GLOBAL_PRESET_KEY`].
pub trait PresetStore {
    fn get(&self, key: &str) -> Result<PresetMap>;
    fn set(&mut self, key: &str, presets: PresetMap) -> Result<()>;
}

pub fn preset_key(project: Option<&str>) -> &str {
    project
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(GLOBAL_PRESET_KEY)
}

/// Save the current selection under `name`, in tree order. Overwrites an existing preset.
pub fn save_preset(
    store: &mut dyn PresetStore,
    project: Option<&str>,
    name: &str,
    tree: &PathTree,
    selection: &SelectionManager,
) -> Result<usize> {
    let name = name.trim();
    if name.is_empty() {
        bail!("preset name must not be empty");
    }
    let paths: Vec<String> = ordered_selected_files(tree, selection)
        .into_iter()
        .map(|file| file.path.clone())
        .collect();
    let count = paths.len();

    let key = preset_key(project);
    let mut presets = store.get(key)?;
    presets.insert(name.to_owned(), paths);
    store.set(key, presets)?;
    tracing::debug!(key, name, count, "preset saved");
    Ok(count)
}

/// Paths stored under `name`, or `None` when there is no such preset.
pub fn load_preset(
    store: &dyn PresetStore,
    project: Option<&str>,
    name: &str,
) -> Result<Option<Vec<String>>> {
    Ok(store.get(preset_key(project))?.remove(name.trim()))
}

pub fn delete_preset(
    store: &mut dyn PresetStore,
    project: Option<&str>,
    name: &str,
) -> Result<bool> {
    let key = preset_key(project);
    let mut presets = store.get(key)?;
    let removed = presets.remove(name.trim()).is_some();
    if removed {
        store.set(key, presets)?;
    }
    Ok(removed)
}

pub fn list_presets(
    store: &dyn PresetStore,
    project: Option<&str>,
) -> Result<Vec<(String, usize)>> {
    Ok(store
        .get(preset_key(project))?
        .into_iter()
        .map(|(name, paths)| (name, paths.len()))
        .collect())
}

/// In-memory store, useful for hosts without persistence.
#[derive(Debug, Clone, Default)]
pub struct MemoryPresetStore {
    entries: HashMap<String, PresetMap>,
}

impl PresetStore for MemoryPresetStore {
    fn get(&self, key: &str) -> Result<PresetMap> {
        Ok(self.entries.get(key).cloned().unwrap_or_default())
    }

    fn set(&mut self, key: &str, presets: PresetMap) -> Result<()> {
        self.entries.insert(key.to_owned(), presets);
        Ok(())
    }
}
