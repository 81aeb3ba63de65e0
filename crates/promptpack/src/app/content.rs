//! Content resolution for selected files, including remote hydration.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;

use crate::app::tree::{FileNode, PathTree};
use crate::domain::model::{RepoIdentity, SourceIdentity};

/// Extensions that are never fetched nor embedded.
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tif", "tiff", "psd", "heic", "avif",
    // audio and video
    "mp3", "mp4", "wav", "ogg", "flac", "avi", "mov", "mkv", "webm", "m4a",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar", "war",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // executables and objects
    "exe", "dll", "so", "dylib", "bin", "o", "a", "lib", "class", "pyc", "wasm",
    // documents and databases
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "db", "sqlite", "sqlite3",
];

pub const BINARY_PLACEHOLDER: &str = "// [binary file skipped]";

/// Whether the path's extension marks it as binary.
pub fn is_binary_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub fn error_placeholder(message: &str) -> String {
    format!("// [error loading content: {message}]")
}

/// Text returned by the remote content adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteContent {
    pub text: String,
    pub byte_size: u64,
}

/// Failure modes of a remote content fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

/// Remote content adapter. Implementations must be callable from several threads at once.
pub trait RemoteContentSource: Send + Sync {
    fn fetch(&self, repo: &RepoIdentity, path: &str) -> Result<RemoteContent, FetchError>;
}

/// Hydrated text of a remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContent {
    pub text: String,
    pub line_count: usize,
    /// Blob hash of the node the content was fetched for.
    pub content_hash: Option<String>,
}

impl CachedContent {
    pub fn new(text: String, content_hash: Option<String>) -> Self {
        Self {
            line_count: text.lines().count(),
            text,
            content_hash,
        }
    }
}

/// Path to content cache kept apart from the structural tree.
#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    entries: HashMap<String, CachedContent>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached content for a file, ignored when the blob hash changed since it was fetched.
    pub fn get(&self, file: &FileNode) -> Option<&CachedContent> {
        self.entries
            .get(&file.path)
            .filter(|cached| cached.content_hash == file.content_hash)
    }

    /// Store content. Writing the same path twice simply overwrites.
    pub fn insert(&mut self, path: impl Into<String>, content: CachedContent) {
        self.entries.insert(path.into(), content);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Read-only view answering "what text do we already have for this file".
#[derive(Debug, Clone, Copy)]
pub struct ContentView<'a> {
    pub tree: &'a PathTree,
    pub cache: &'a ContentCache,
}

impl<'a> ContentView<'a> {
    pub fn new(tree: &'a PathTree, cache: &'a ContentCache) -> Self {
        Self { tree, cache }
    }

    pub fn text<'f>(&self, file: &'f FileNode) -> Option<&'f str>
    where
        'a: 'f,
    {
        file.content
            .as_deref()
            .or_else(|| self.cache.get(file).map(|cached| cached.text.as_str()))
    }

    pub fn line_count(&self, file: &FileNode) -> Option<usize> {
        file.line_count
            .or_else(|| self.cache.get(file).map(|cached| cached.line_count))
    }
}

/// Outcome of resolving one file for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedContent {
    Text(String),
    Binary,
    Failed(String),
}

impl ResolvedContent {
    /// Body emitted into a bundle for this file.
    pub fn body(&self) -> String {
        match self {
            ResolvedContent::Text(text) => text.clone(),
            ResolvedContent::Binary => BINARY_PLACEHOLDER.to_owned(),
            ResolvedContent::Failed(message) => error_placeholder(message),
        }
    }
}

/// Resolve a single file, fetching and caching remote content when needed.
pub fn get_content(
    file: &FileNode,
    cache: &mut ContentCache,
    remote: Option<(&dyn RemoteContentSource, &RepoIdentity)>,
) -> ResolvedContent {
    if is_binary_path(&file.path) {
        return ResolvedContent::Binary;
    }
    if let Some(text) = &file.content {
        return ResolvedContent::Text(text.clone());
    }
    if let Some(cached) = cache.get(file) {
        return ResolvedContent::Text(cached.text.clone());
    }
    let Some((source, repo)) = remote else {
        return ResolvedContent::Failed("content not loaded".into());
    };
    match source.fetch(repo, &file.path) {
        Ok(remote) => {
            let cached = CachedContent::new(remote.text, file.content_hash.clone());
            let text = cached.text.clone();
            cache.insert(file.path.clone(), cached);
            ResolvedContent::Text(text)
        }
        Err(err) => {
            tracing::warn!(path = %file.path, error = %err, "content fetch failed");
            ResolvedContent::Failed(err.to_string())
        }
    }
}

/// Identifies the source state a hydration job was started against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub identity: SourceIdentity,
    pub generation: u64,
}

/// A batch of remote fetches detached from the workspace so it can run elsewhere.
#[derive(Debug, Clone)]
pub struct HydrationJob {
    pub(crate) ticket: FetchTicket,
    pub(crate) repo: RepoIdentity,
    pub(crate) tree: Arc<PathTree>,
    pub(crate) paths: Vec<String>,
}

impl HydrationJob {
    /// Issue every fetch concurrently and wait for all of them. One failure never affects the
    /// other files.
    pub fn run(self, source: &dyn RemoteContentSource) -> HydrationResult {
        let repo = &self.repo;
        let tree = &self.tree;
        let outcomes: Vec<(String, Result<CachedContent, FetchError>)> = self
            .paths
            .par_iter()
            .map(|path| {
                let hash = tree.find_file(path).and_then(|f| f.content_hash.clone());
                let outcome = source
                    .fetch(repo, path)
                    .map(|remote| CachedContent::new(remote.text, hash));
                if let Err(err) = &outcome {
                    tracing::warn!(path = %path, error = %err, "content fetch failed");
                }
                (path.clone(), outcome)
            })
            .collect();

        let mut fetched = Vec::new();
        let mut failures = HashMap::new();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(content) => fetched.push((path, content)),
                Err(err) => {
                    failures.insert(path, err.to_string());
                }
            }
        }

        HydrationResult {
            ticket: Some(self.ticket),
            fetched,
            failures,
        }
    }
}

/// Results of a finished [`HydrationJob`].
#[derive(Debug, Clone, Default)]
pub struct HydrationResult {
    pub ticket: Option<FetchTicket>,
    pub fetched: Vec<(String, CachedContent)>,
    /// Error messages keyed by path.
    pub failures: HashMap<String, String>,
}
