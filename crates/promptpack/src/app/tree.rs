//! Hierarchical file tree built from flat path listings.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::domain::errors::TreeWarning;
use crate::domain::model::{LocalRecord, RemoteEntryKind, RemoteRecord, SourceKind};

/// Metadata carried by a file leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    pub line_count: Option<usize>,
    /// Eager for local files, absent for remote files until hydrated.
    pub content: Option<String>,
    pub byte_size: Option<u64>,
    /// Blob SHA reported by GitHub. Identity marker only.
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirNode {
    pub name: String,
    pub path: String,
    pub children: BTreeMap<String, TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    File(FileNode),
    Directory(DirNode),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::File(file) => &file.name,
            TreeNode::Directory(dir) => &dir.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            TreeNode::File(file) => &file.path,
            TreeNode::Directory(dir) => &dir.path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, TreeNode::Directory(_))
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            TreeNode::File(file) => Some(file),
            TreeNode::Directory(_) => None,
        }
    }

    /// Collect every file path under this node. A file yields itself.
    pub fn list_descendant_files(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_files(self, &mut out);
        out
    }
}

fn collect_files(node: &TreeNode, out: &mut Vec<String>) {
    match node {
        TreeNode::File(file) => out.push(file.path.clone()),
        TreeNode::Directory(dir) => {
            for child in dir.children.values() {
                collect_files(child, out);
            }
        }
    }
}

/// Source-neutral input to [`PathTree::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeRecord {
    File {
        path: String,
        line_count: Option<usize>,
        content: Option<String>,
        byte_size: Option<u64>,
        content_hash: Option<String>,
    },
    Directory {
        path: String,
    },
}

impl TreeRecord {
    pub fn path(&self) -> &str {
        match self {
            TreeRecord::File { path, .. } | TreeRecord::Directory { path } => path,
        }
    }
}

impl From<LocalRecord> for TreeRecord {
    fn from(record: LocalRecord) -> Self {
        TreeRecord::File {
            path: record.path,
            line_count: Some(record.line_count),
            content: Some(record.content),
            byte_size: Some(record.byte_size),
            content_hash: None,
        }
    }
}

impl TreeRecord {
    /// Convert a remote listing entry. Entries that are neither files nor directories are
    /// dropped.
    pub fn from_remote(record: RemoteRecord) -> Option<Self> {
        match record.kind {
            RemoteEntryKind::File => Some(TreeRecord::File {
                path: record.path,
                line_count: None,
                content: None,
                byte_size: record.byte_size,
                content_hash: record.content_hash,
            }),
            RemoteEntryKind::Directory => Some(TreeRecord::Directory { path: record.path }),
            RemoteEntryKind::Other => None,
        }
    }
}

/// Root-level mapping of names to nodes plus the warnings collected while building it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTree {
    roots: BTreeMap<String, TreeNode>,
    warnings: Vec<TreeWarning>,
}

impl PathTree {
    /// Build a tree from records of either source.
    ///
    /// GitHub records are sorted by path before insertion so directories are established in a
    /// stable order regardless of how the listing arrived.
    pub fn build(records: impl IntoIterator<Item = TreeRecord>, kind: SourceKind) -> Self {
        let mut records: Vec<TreeRecord> = records.into_iter().collect();
        if kind == SourceKind::GitHub {
            records.sort_by(|a, b| a.path().cmp(b.path()));
        }

        let mut tree = Self::default();
        for record in records {
            tree.insert(record);
        }
        tracing::debug!(
            files = tree.file_count(),
            warnings = tree.warnings.len(),
            source = kind.as_str(),
            "built path tree"
        );
        tree
    }

    pub fn from_local(records: impl IntoIterator<Item = LocalRecord>) -> Self {
        Self::build(records.into_iter().map(TreeRecord::from), SourceKind::Local)
    }

    pub fn from_remote(records: impl IntoIterator<Item = RemoteRecord>) -> Self {
        Self::build(
            records.into_iter().filter_map(TreeRecord::from_remote),
            SourceKind::GitHub,
        )
    }

    pub fn roots(&self) -> &BTreeMap<String, TreeNode> {
        &self.roots
    }

    pub fn warnings(&self) -> &[TreeWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Look up a node by its slash separated path.
    pub fn find_node(&self, path: &str) -> Option<&TreeNode> {
        let mut segments = path.split('/');
        let mut node = self.roots.get(segments.next()?)?;
        for segment in segments {
            match node {
                TreeNode::Directory(dir) => node = dir.children.get(segment)?,
                TreeNode::File(_) => return None,
            }
        }
        Some(node)
    }

    pub fn find_file(&self, path: &str) -> Option<&FileNode> {
        self.find_node(path).and_then(TreeNode::as_file)
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.find_file(path).is_some()
    }

    /// Every file path known to the tree.
    pub fn all_files(&self) -> Vec<String> {
        let mut out = Vec::new();
        for node in self.roots.values() {
            collect_files(node, &mut out);
        }
        out
    }

    pub fn file_count(&self) -> usize {
        self.roots.values().map(count_files).sum()
    }

    fn insert(&mut self, record: TreeRecord) {
        let raw = record.path().to_owned();
        let Some(segments) = split_path(&raw) else {
            tracing::warn!(path = %raw, "skipping malformed path");
            self.warnings.push(TreeWarning::MalformedPath { raw: raw.clone() });
            return;
        };

        let (leaf, parents) = match segments.split_last() {
            Some(split) => split,
            None => return,
        };

        let mut children = &mut self.roots;
        let mut prefix = String::new();
        for segment in parents {
            let path = join(&prefix, segment);
            let entry = children
                .entry((*segment).to_owned())
                .or_insert_with(|| TreeNode::Directory(DirNode {
                    name: (*segment).to_owned(),
                    path: path.clone(),
                    children: BTreeMap::new(),
                }));

            if let TreeNode::File(_) = entry {
                tracing::warn!(path = %path, "file path reused as directory; dropping file data");
                self.warnings.push(TreeWarning::PathConflict { path: path.clone() });
                *entry = TreeNode::Directory(DirNode {
                    name: (*segment).to_owned(),
                    path: path.clone(),
                    children: BTreeMap::new(),
                });
            }

            children = match entry {
                TreeNode::Directory(dir) => &mut dir.children,
                TreeNode::File(_) => return,
            };
            prefix = path;
        }

        let path = join(&prefix, leaf);
        match record {
            TreeRecord::Directory { .. } => {
                let entry = children.entry((*leaf).to_owned()).or_insert_with(|| {
                    TreeNode::Directory(DirNode {
                        name: (*leaf).to_owned(),
                        path: path.clone(),
                        children: BTreeMap::new(),
                    })
                });
                if let TreeNode::File(_) = entry {
                    tracing::warn!(path = %path, "directory entry replaces file");
                    self.warnings.push(TreeWarning::PathConflict { path: path.clone() });
                    *entry = TreeNode::Directory(DirNode {
                        name: (*leaf).to_owned(),
                        path,
                        children: BTreeMap::new(),
                    });
                }
            }
            TreeRecord::File {
                line_count,
                content,
                byte_size,
                content_hash,
                ..
            } => {
                if let Some(TreeNode::Directory(_)) = children.get(*leaf) {
                    tracing::warn!(
                        path = %path,
                        "file record collides with directory; dropping file"
                    );
                    self.warnings.push(TreeWarning::PathConflict { path });
                    return;
                }
                children.insert(
                    (*leaf).to_owned(),
                    TreeNode::File(FileNode {
                        name: (*leaf).to_owned(),
                        path,
                        line_count,
                        content,
                        byte_size,
                        content_hash,
                    }),
                );
            }
        }
    }
}

fn count_files(node: &TreeNode) -> usize {
    match node {
        TreeNode::File(_) => 1,
        TreeNode::Directory(dir) => dir.children.values().map(count_files).sum(),
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_owned()
    } else {
        format!("{prefix}/{segment}")
    }
}

/// Split a raw path into segments, rejecting empty, `.` and `..` components.
fn split_path(raw: &str) -> Option<Vec<&str>> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments
        .iter()
        .any(|segment| segment.is_empty() || *segment == "." || *segment == "..")
    {
        return None;
    }
    Some(segments)
}

/// Directory-first, then case-insensitive name order with a byte-wise tie break.
pub fn display_order(a: &TreeNode, b: &TreeNode) -> Ordering {
    b.is_dir()
        .cmp(&a.is_dir())
        .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
        .then_with(|| a.name().cmp(b.name()))
}

/// Children of a directory (or the roots) in display order.
pub fn sorted_children(children: &BTreeMap<String, TreeNode>) -> Vec<&TreeNode> {
    let mut nodes: Vec<&TreeNode> = children.values().collect();
    nodes.sort_by(|a, b| display_order(a, b));
    nodes
}

/// Every strict ancestor directory path of `path`, outermost first.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut end = 0;
    while let Some(offset) = path[end..].find('/') {
        end += offset;
        out.push(path[..end].to_owned());
        end += 1;
    }
    out
}
