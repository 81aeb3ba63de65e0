//! Local folder scanning.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder, WalkState};
use time::OffsetDateTime;

use crate::app::content::is_binary_path;
use crate::domain::model::LocalRecord;
use crate::infra::config::Config;

const PROMPTPACK_IGNORE: &str = ".promptpackignore";

/// Reason a file was left out of the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LargeFile,
    BinaryContent,
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// Records of one scan run, all sharing the same upload timestamp.
#[derive(Debug, Clone)]
pub struct LocalScan {
    /// Name of the scanned folder.
    pub label: String,
    pub root: PathBuf,
    pub records: Vec<LocalRecord>,
    pub skipped: Vec<SkippedFile>,
    pub uploaded_at: OffsetDateTime,
}

/// Configuration inputs for the scanner.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub root: PathBuf,
    pub max_file_size: u64,
    pub excluded_folders: Vec<String>,
    pub allowed_extensions: Vec<String>,
}

impl ScannerConfig {
    pub fn from_config(root: PathBuf, config: &Config) -> Self {
        Self {
            root,
            max_file_size: config.local.max_file_size(),
            excluded_folders: config.local.excluded_folders.clone(),
            allowed_extensions: config.local.allowed_extensions.clone(),
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    fn allows(&self, rel_path: &str) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        let Some(ext) = Path::new(rel_path).extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Walks a folder in parallel, honoring `.gitignore`, excluded folders and `.promptpackignore`.
#[derive(Debug, Default)]
pub struct Scanner;

impl Scanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, cfg: &ScannerConfig) -> Result<LocalScan> {
        if !cfg.root.is_dir() {
            bail!("{} is not a readable directory", cfg.root.display());
        }
        let uploaded_at = OffsetDateTime::now_utc();
        let matcher = Arc::new(build_exclude_matcher(&cfg.root, cfg)?);

        let mut builder = WalkBuilder::new(&cfg.root);
        builder.git_ignore(true).hidden(false);

        let root = cfg.root.clone();
        builder.filter_entry({
            let matcher = matcher.clone();
            move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                !matcher.is_match(rel)
            }
        });

        let outcomes = Mutex::new(Vec::new());
        let cfg_ref = Arc::new(cfg.clone());

        builder.build_parallel().run(|| {
            let outcomes = &outcomes;
            let cfg = cfg_ref.clone();
            Box::new(move |result| match result {
                Ok(entry) => {
                    if let Some(outcome) = process_entry(&entry, &cfg)
                        && let Ok(mut guard) = outcomes.lock()
                    {
                        guard.push(outcome);
                    }
                    WalkState::Continue
                }
                Err(err) => {
                    tracing::warn!(error = %err, "scanner error");
                    WalkState::Continue
                }
            })
        });

        let mut records = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes.into_inner().unwrap_or_default() {
            match outcome {
                EntryOutcome::Record(record) => records.push(record),
                EntryOutcome::Skipped(file) => skipped.push(file),
            }
        }
        records.sort_by(|a, b| a.path.cmp(&b.path));
        skipped.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::debug!(
            root = %cfg.root.display(),
            files = records.len(),
            skipped = skipped.len(),
            "local scan finished"
        );

        Ok(LocalScan {
            label: folder_label(&cfg.root),
            root: cfg.root.clone(),
            records,
            skipped,
            uploaded_at,
        })
    }
}

enum EntryOutcome {
    Record(LocalRecord),
    Skipped(SkippedFile),
}

fn process_entry(entry: &DirEntry, cfg: &ScannerConfig) -> Option<EntryOutcome> {
    if !entry.file_type().is_some_and(|kind| kind.is_file()) {
        return None;
    }
    let path = entry.path();
    let rel_path = to_record_path(&cfg.root, path);
    if !cfg.allows(&rel_path) {
        return None;
    }

    let skip = |reason| {
        Some(EntryOutcome::Skipped(SkippedFile {
            path: rel_path.clone(),
            reason,
        }))
    };

    let byte_size = match entry.metadata() {
        Ok(metadata) => metadata.len(),
        Err(err) => {
            tracing::warn!(path = %rel_path, error = %err, "failed to stat file");
            return skip(SkipReason::Unreadable);
        }
    };

    if is_binary_path(&rel_path) {
        return Some(EntryOutcome::Record(LocalRecord {
            path: rel_path,
            line_count: 0,
            content: String::new(),
            byte_size,
        }));
    }
    if byte_size > cfg.max_file_size {
        return skip(SkipReason::LargeFile);
    }

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(path = %rel_path, error = %err, "failed to read file");
            return skip(SkipReason::Unreadable);
        }
    };
    if bytes.contains(&0) {
        return skip(SkipReason::BinaryContent);
    }
    let content = String::from_utf8_lossy(&bytes).into_owned();

    Some(EntryOutcome::Record(LocalRecord {
        line_count: content.lines().count(),
        path: rel_path,
        content,
        byte_size,
    }))
}

/// Slash-separated path relative to the scan root.
fn to_record_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn folder_label(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

fn build_exclude_matcher(root: &Path, cfg: &ScannerConfig) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();

    for folder in &cfg.excluded_folders {
        for expanded in expand_dir_pattern(folder) {
            let glob = Glob::new(&expanded)
                .with_context(|| format!("invalid excluded folder '{folder}'"))?;
            builder.add(glob);
        }
    }

    for pattern in load_promptpackignore(root)? {
        for expanded in expand_dir_pattern(&pattern) {
            let glob = Glob::new(&expanded)
                .with_context(|| format!("invalid {PROMPTPACK_IGNORE} pattern '{pattern}'"))?;
            builder.add(glob);
        }
    }

    builder.add(Glob::new(PROMPTPACK_IGNORE)?);

    builder.build().context("failed to build exclude matcher")
}

fn expand_dir_pattern(raw: &str) -> Vec<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    vec![
        trimmed.to_owned(),
        format!("{trimmed}/**"),
        format!("**/{trimmed}"),
        format!("**/{trimmed}/**"),
    ]
}

fn load_promptpackignore(root: &Path) -> Result<Vec<String>> {
    let path = root.join(PROMPTPACK_IGNORE);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut patterns = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        patterns.push(trimmed.to_owned());
    }
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(root: &Path, config: &Config) -> Result<LocalScan> {
        Scanner::new().scan(&ScannerConfig::from_config(root.to_path_buf(), config))
    }

    fn paths(scan: &LocalScan) -> Vec<&str> {
        scan.records.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn skips_excluded_folders_anywhere() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("src"))?;
        fs::create_dir_all(root.join("web/node_modules/pkg"))?;
        fs::create_dir_all(root.join("target/debug"))?;
        fs::write(root.join("src/lib.rs"), "fn lib() {}\n")?;
        fs::write(root.join("web/node_modules/pkg/index.js"), "ignored")?;
        fs::write(root.join("target/debug/out.txt"), "ignored")?;

        let result = scan(root, &Config::default())?;
        assert_eq!(paths(&result), vec!["src/lib.rs"]);
        assert_eq!(result.records[0].line_count, 1);
        Ok(())
    }

    #[test]
    fn applies_allowed_extensions() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::write(root.join("main.RS"), "fn main() {}")?;
        fs::write(root.join("notes.md"), "# notes")?;
        fs::write(root.join("Makefile"), "all:")?;

        let mut config = Config::default();
        config.local.allowed_extensions = vec![".rs".into()];
        let result = scan(root, &config)?;
        assert_eq!(paths(&result), vec!["main.RS"]);
        Ok(())
    }

    #[test]
    fn binary_extensions_are_listed_without_reading() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::write(root.join("logo.png"), vec![0u8; 4096])?;

        let result = Scanner::new().scan(
            &ScannerConfig::from_config(root.to_path_buf(), &Config::default())
                .with_max_file_size(1024),
        )?;
        let logo = &result.records[0];
        assert_eq!(logo.path, "logo.png");
        assert_eq!(logo.byte_size, 4096);
        assert!(logo.content.is_empty());
        Ok(())
    }

    #[test]
    fn skips_large_and_binary_content() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::write(root.join("large.txt"), "x".repeat(4096))?;
        fs::write(root.join("blob.dat"), b"abc\0def")?;
        fs::write(root.join("text.txt"), "hello")?;

        let result = Scanner::new().scan(
            &ScannerConfig::from_config(root.to_path_buf(), &Config::default())
                .with_max_file_size(1024),
        )?;
        assert_eq!(paths(&result), vec!["text.txt"]);
        assert_eq!(
            result.skipped,
            vec![
                SkippedFile {
                    path: "blob.dat".into(),
                    reason: SkipReason::BinaryContent,
                },
                SkippedFile {
                    path: "large.txt".into(),
                    reason: SkipReason::LargeFile,
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn respects_promptpackignore() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path();
        fs::create_dir_all(root.join("generated"))?;
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join("generated/output.txt"), "not included")?;
        fs::write(root.join("src/main.rs"), "fn main() {}")?;
        fs::write(root.join(PROMPTPACK_IGNORE), "# comment\ngenerated/\n")?;

        let result = scan(root, &Config::default())?;
        assert_eq!(paths(&result), vec!["src/main.rs"]);
        Ok(())
    }

    #[test]
    fn label_is_the_folder_name() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().join("my-project");
        fs::create_dir_all(&root)?;
        fs::write(root.join("a.txt"), "a")?;
        assert_eq!(scan(&root, &Config::default())?.label, "my-project");
        Ok(())
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        assert!(scan(&temp.path().join("nope"), &Config::default()).is_err());
    }
}
