//! Managing the selected file set and derived checkbox states.

use std::collections::BTreeSet;

use crate::app::tree::{PathTree, TreeNode};

/// Aggregated selection state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Empty,
    Full,
    Partial,
}

/// Tracks the authoritative set of selected file paths.
///
/// Directories are never stored; their state is always derived from the files beneath them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectionManager {
    paths: BTreeSet<String>,
}

impl SelectionManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of selected files.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Selected paths in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Select or deselect a node. Directories apply the direction to every descendant file, so
    /// selecting a partially selected folder always ends fully selected.
    pub fn toggle(&mut self, node: &TreeNode, make_selected: bool) {
        match node {
            TreeNode::File(file) => {
                if make_selected {
                    self.paths.insert(file.path.clone());
                } else {
                    self.paths.remove(&file.path);
                }
            }
            TreeNode::Directory(_) => {
                let files = node.list_descendant_files();
                if make_selected {
                    self.paths.extend(files);
                } else {
                    for path in &files {
                        self.paths.remove(path);
                    }
                }
            }
        }
    }

    /// Toggle by path. Returns `false` when the path is not in the tree.
    pub fn toggle_path(&mut self, tree: &PathTree, path: &str, make_selected: bool) -> bool {
        match tree.find_node(path) {
            Some(node) => {
                self.toggle(node, make_selected);
                true
            }
            None => false,
        }
    }

    /// Derived state of a node.
    pub fn state(&self, node: &TreeNode) -> SelectionState {
        match node {
            TreeNode::File(file) => {
                if self.paths.contains(&file.path) {
                    SelectionState::Full
                } else {
                    SelectionState::Empty
                }
            }
            TreeNode::Directory(_) => {
                let files = node.list_descendant_files();
                let selected = files.iter().filter(|path| self.paths.contains(*path)).count();
                if selected == 0 {
                    SelectionState::Empty
                } else if selected == files.len() {
                    SelectionState::Full
                } else {
                    SelectionState::Partial
                }
            }
        }
    }

    /// Select every file known to the tree, including ones hidden by a filter.
    pub fn select_all(&mut self, tree: &PathTree) {
        self.paths.extend(tree.all_files());
    }

    /// Remove all selections.
    pub fn deselect_all(&mut self) {
        self.paths.clear();
    }

    /// Add the given paths that resolve to files in the tree. Returns how many were added.
    pub fn select_visible<'a>(
        &mut self,
        tree: &PathTree,
        visible: impl IntoIterator<Item = &'a str>,
    ) -> usize {
        let mut added = 0;
        for path in visible {
            if tree.contains_file(path) && self.paths.insert(path.to_owned()) {
                added += 1;
            }
        }
        added
    }

    /// Remove the given paths. Returns how many were removed.
    pub fn deselect_visible<'a>(&mut self, visible: impl IntoIterator<Item = &'a str>) -> usize {
        visible
            .into_iter()
            .filter(|path| self.paths.remove(*path))
            .count()
    }

    /// Replace the selection with the given paths, keeping only files present in the tree.
    /// Returns the number of paths kept.
    pub fn replace<'a>(
        &mut self,
        tree: &PathTree,
        paths: impl IntoIterator<Item = &'a str>,
    ) -> usize {
        self.paths = paths
            .into_iter()
            .filter(|path| tree.contains_file(path))
            .map(str::to_owned)
            .collect();
        self.paths.len()
    }

    /// Drop paths that no longer exist as files in the tree. Returns how many were dropped.
    pub fn retain_existing(&mut self, tree: &PathTree) -> usize {
        let before = self.paths.len();
        self.paths.retain(|path| tree.contains_file(path));
        before - self.paths.len()
    }
}
