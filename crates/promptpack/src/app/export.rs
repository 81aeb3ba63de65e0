//! Export bundle rendering.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::anyhow;
use clap::ValueEnum;
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::app::content::{BINARY_PLACEHOLDER, ContentView, error_placeholder, is_binary_path};
use crate::app::freshness::freshness;
use crate::app::minify::minify;
use crate::app::selection::SelectionManager;
use crate::app::tokens::TokenEstimate;
use crate::app::tree::{FileNode, PathTree, TreeNode, sorted_children};
use crate::domain::errors::Notice;
use crate::domain::model::{ExportArtifact, SourceContext};
use crate::infra::config::Config;

const FILE_SEPARATOR: &str = "\n\n";

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Project tree followed by every selected file's content.
    FullCode,
    /// One selected path per line.
    PathList,
    /// Human readable report with totals and the path list.
    Markdown,
    /// Tree of the selected files only.
    Tree,
}

impl ExportFormat {
    /// Return a stable identifier for configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::FullCode => "full-code",
            ExportFormat::PathList => "path-list",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Tree => "tree",
        }
    }

    /// Recommended file extension for the format.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::FullCode | ExportFormat::PathList | ExportFormat::Tree => "txt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportFormatParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full-code" | "full" | "code" => Ok(ExportFormat::FullCode),
            "path-list" | "paths" | "list" => Ok(ExportFormat::PathList),
            "markdown" | "md" | "summary" => Ok(ExportFormat::Markdown),
            "tree" => Ok(ExportFormat::Tree),
            other => Err(ExportFormatParseError::UnknownFormat(other.to_string())),
        }
    }
}

/// Error returned when parsing an [`ExportFormat`] fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ExportFormatParseError {
    #[error("unknown export format '{0}'")]
    UnknownFormat(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Notice(#[from] Notice),
    #[error("failed to render export: {0}")]
    Render(String),
}

/// Runtime options controlling export behavior.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Apply the lossy minifier to file bodies in full code dumps.
    pub minify: bool,
    /// Reference time for the freshness badge. Fixed per export so output is reproducible.
    pub now: OffsetDateTime,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            minify: false,
            now: OffsetDateTime::now_utc(),
        }
    }

    /// Build options from configuration defaults.
    pub fn from_config(config: &Config) -> Self {
        let format = config
            .defaults
            .export_format()
            .parse::<ExportFormat>()
            .unwrap_or(ExportFormat::FullCode);
        Self {
            minify: config.defaults.minify(),
            ..Self::new(format)
        }
    }
}

/// Everything a render needs, borrowed from the workspace.
#[derive(Debug, Clone, Copy)]
pub struct ExportInput<'a> {
    pub source: &'a SourceContext,
    pub selection: &'a SelectionManager,
    pub view: ContentView<'a>,
    /// Fetch errors from the hydration that preceded this export, keyed by path.
    pub failures: &'a HashMap<String, String>,
    pub tokens: TokenEstimate,
}

/// Renders selections into export artifacts.
pub struct Exporter {
    env: Environment<'static>,
}

impl Exporter {
    /// Create a new exporter with the built-in templates loaded.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            env: default_environment()?,
        })
    }

    pub fn render(
        &self,
        input: &ExportInput<'_>,
        options: &ExportOptions,
    ) -> Result<ExportArtifact, ExportError> {
        if input.selection.is_empty() {
            return Err(Notice::NoFilesSelected.into());
        }

        let tree = input.view.tree;
        let files = ordered_selected_files(tree, input.selection);
        let text = match options.format {
            ExportFormat::Tree => render_tree(tree, input.selection),
            ExportFormat::PathList => render_path_list(&files),
            ExportFormat::FullCode => render_full_code(input, &files, options.minify),
            ExportFormat::Markdown => self.render_markdown(input, &files, options)?,
        };

        Ok(ExportArtifact {
            format: options.format,
            text,
            file_count: files.len(),
        })
    }

    fn render_markdown(
        &self,
        input: &ExportInput<'_>,
        files: &[&FileNode],
        options: &ExportOptions,
    ) -> Result<String, ExportError> {
        let snapshot = match input.source.snapshot_at() {
            Some(at) => {
                let stamp = at
                    .format(&Rfc3339)
                    .map_err(|err| ExportError::Render(err.to_string()))?;
                let age = freshness(at, options.now);
                Some(TemplateSnapshot {
                    timestamp: stamp,
                    tier: age.tier.as_str().to_owned(),
                    relative: age.relative,
                })
            }
            None => None,
        };

        let (identity_label, truncated) = match input.source {
            SourceContext::Local { .. } => ("Folder", false),
            SourceContext::GitHub { truncated, .. } => ("Repository", *truncated),
        };

        let context = TemplateContext {
            source_kind: input.source.kind().as_str().to_owned(),
            identity_label: identity_label.to_owned(),
            identity: input.source.display_label(),
            snapshot,
            truncated,
            files_scanned: input.view.tree.file_count(),
            selected_files: files.len(),
            selected_lines: files
                .iter()
                .map(|file| input.view.line_count(file).unwrap_or(0))
                .sum(),
            tokens: input.tokens.total,
            token_budget: input.tokens.budget,
            over_budget: input.tokens.exceeds_budget(),
            paths: files.iter().map(|file| file.path.clone()).collect(),
        };

        self.env
            .get_template("summary")
            .and_then(|template| template.render(&context))
            .map(|rendered| rendered.trim_end().to_owned())
            .map_err(|err| ExportError::Render(err.to_string()))
    }
}

fn default_environment() -> anyhow::Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("summary", SUMMARY_TEMPLATE)
        .map_err(|err| anyhow!("failed to register summary template: {err}"))?;
    Ok(env)
}

/// Selected files in tree order: directories first, then alphabetical, at every level.
pub fn ordered_selected_files<'a>(
    tree: &'a PathTree,
    selection: &SelectionManager,
) -> Vec<&'a FileNode> {
    fn walk<'a>(node: &'a TreeNode, selection: &SelectionManager, out: &mut Vec<&'a FileNode>) {
        match node {
            TreeNode::File(file) => {
                if selection.contains(&file.path) {
                    out.push(file);
                }
            }
            TreeNode::Directory(dir) => {
                for child in sorted_children(&dir.children) {
                    walk(child, selection, out);
                }
            }
        }
    }

    let mut out = Vec::with_capacity(selection.len());
    for node in sorted_children(tree.roots()) {
        walk(node, selection, &mut out);
    }
    out
}

/// Render the sub-tree induced by the selected files with box-drawing connectors.
pub fn render_tree(tree: &PathTree, selection: &SelectionManager) -> String {
    let mut lines = Vec::new();
    render_level(sorted_children(tree.roots()), selection, "", &mut lines);
    lines.join("\n")
}

fn render_level(
    nodes: Vec<&TreeNode>,
    selection: &SelectionManager,
    prefix: &str,
    lines: &mut Vec<String>,
) {
    let included: Vec<&TreeNode> = nodes
        .into_iter()
        .filter(|node| has_selected(node, selection))
        .collect();

    let count = included.len();
    for (idx, node) in included.into_iter().enumerate() {
        let is_last = idx + 1 == count;
        let connector = if is_last { "└── " } else { "├── " };
        lines.push(format!("{prefix}{connector}{}", node.name()));

        if let TreeNode::Directory(dir) = node {
            let extension = if is_last { "    " } else { "│   " };
            render_level(
                sorted_children(&dir.children),
                selection,
                &format!("{prefix}{extension}"),
                lines,
            );
        }
    }
}

fn has_selected(node: &TreeNode, selection: &SelectionManager) -> bool {
    match node {
        TreeNode::File(file) => selection.contains(&file.path),
        TreeNode::Directory(dir) => dir
            .children
            .values()
            .any(|child| has_selected(child, selection)),
    }
}

fn render_path_list(files: &[&FileNode]) -> String {
    files
        .iter()
        .map(|file| file.path.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_full_code(input: &ExportInput<'_>, files: &[&FileNode], minify_bodies: bool) -> String {
    let tree = render_tree(input.view.tree, input.selection);
    let blocks: Vec<String> = files
        .iter()
        .map(|file| format!("// {}\n{}", file.path, file_body(input, file, minify_bodies)))
        .collect();
    format!("{tree}{FILE_SEPARATOR}{}", blocks.join(FILE_SEPARATOR))
}

fn file_body(input: &ExportInput<'_>, file: &FileNode, minify_bodies: bool) -> String {
    if is_binary_path(&file.path) {
        return BINARY_PLACEHOLDER.to_owned();
    }
    match input.view.text(file) {
        Some(text) if minify_bodies => minify(text),
        Some(text) => text.trim_end_matches(['\n', '\r']).to_owned(),
        None => match input.failures.get(&file.path) {
            Some(message) => error_placeholder(message),
            None => error_placeholder("content not loaded"),
        },
    }
}

#[derive(Serialize)]
struct TemplateContext {
    source_kind: String,
    identity_label: String,
    identity: String,
    snapshot: Option<TemplateSnapshot>,
    truncated: bool,
    files_scanned: usize,
    selected_files: usize,
    selected_lines: usize,
    tokens: usize,
    token_budget: u32,
    over_budget: bool,
    paths: Vec<String>,
}

#[derive(Serialize)]
struct TemplateSnapshot {
    timestamp: String,
    tier: String,
    relative: String,
}

const SUMMARY_TEMPLATE: &str = r#"# Context Summary

- Source: {{ source_kind }}
- {{ identity_label }}: {{ identity }}
{% if snapshot %}
- Snapshot: {{ snapshot.timestamp }} ({{ snapshot.tier }}, {{ snapshot.relative }})
{% else %}
- Snapshot: unknown
{% endif %}
{% if truncated %}

> Warning: the repository listing was truncated; some files may be missing.
{% endif %}

## Totals

- Files scanned: {{ files_scanned }}
- Selected files: {{ selected_files }}
- Selected lines: {{ selected_lines }}
- Estimated tokens: {{ tokens }} / {{ token_budget }}
{% if over_budget %}

> Warning: the estimated token count exceeds the budget of {{ token_budget }} tokens.
{% endif %}

## Files

{% for path in paths %}
- {{ path }}
{% endfor %}
"#;
