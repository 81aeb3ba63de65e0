//! Name and content search driving the visible subset of the tree.

use std::collections::BTreeSet;

use crate::app::content::ContentView;
use crate::app::tree::{TreeNode, ancestors};

/// Nodes matching a query and the directories that must be expanded to reveal them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub query: String,
    /// Matching nodes, including directories that only contain matches.
    pub matches: BTreeSet<String>,
    /// Ancestor directories of every match.
    pub expand: BTreeSet<String>,
}

impl SearchResult {
    pub fn is_match(&self, path: &str) -> bool {
        self.matches.contains(path)
    }

    /// Matching file paths, suitable for "select visible".
    pub fn visible_files<'a>(&'a self, view: ContentView<'a>) -> impl Iterator<Item = &'a str> {
        self.matches
            .iter()
            .map(String::as_str)
            .filter(move |path| view.tree.contains_file(path))
    }
}

/// Run a case-insensitive substring search. Returns `None` for a blank query, meaning no
/// filtering is active.
pub fn search(view: ContentView<'_>, query: &str) -> Option<SearchResult> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let mut matches = BTreeSet::new();
    for node in view.tree.roots().values() {
        collect_matches(view, node, &needle, &mut matches);
    }

    let expand = matches
        .iter()
        .flat_map(|path| ancestors(path))
        .collect::<BTreeSet<_>>();

    tracing::debug!(query, matches = matches.len(), "search applied");
    Some(SearchResult {
        query: query.to_owned(),
        matches,
        expand,
    })
}

fn collect_matches(
    view: ContentView<'_>,
    node: &TreeNode,
    needle: &str,
    matches: &mut BTreeSet<String>,
) -> bool {
    let name_hit = node.name().to_lowercase().contains(needle);
    let hit = match node {
        TreeNode::File(file) => {
            name_hit
                || view
                    .text(file)
                    .is_some_and(|text| text.to_lowercase().contains(needle))
        }
        TreeNode::Directory(dir) => {
            let mut any_child = false;
            for child in dir.children.values() {
                any_child |= collect_matches(view, child, needle, matches);
            }
            name_hit || any_child
        }
    };
    if hit {
        matches.insert(node.path().to_owned());
    }
    hit
}
