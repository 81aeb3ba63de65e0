use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use promptpack::Workspace;
use promptpack::app::export::{ExportFormat, ExportOptions};
use promptpack::app::presets::{delete_preset, list_presets, load_preset, save_preset};
use promptpack::app::scan::{Scanner, ScannerConfig};
use promptpack::domain::errors::Notice;
use promptpack::infra::config::Config;
use promptpack::infra::store::JsonStateStore;

#[derive(Debug, Parser)]
#[command(name = "promptpack", version, about = "Bundle project files into LLM-ready context")]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// State file for presets and remembered folders.
    #[arg(long, global = true, value_name = "FILE")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan a folder and print or write an export bundle.
    Bundle(BundleArgs),
    /// Manage named selections.
    #[command(subcommand)]
    Preset(PresetCommand),
    /// List remembered folders.
    Folders,
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Folder to scan.
    #[arg(required_unless_present = "folder")]
    root: Option<PathBuf>,

    /// Reopen a remembered folder by label instead of passing a path.
    #[arg(long, conflicts_with = "root")]
    folder: Option<String>,

    /// Project id for presets. Defaults to the global preset key.
    #[arg(long)]
    project: Option<String>,
}

#[derive(Debug, Args)]
struct SelectionArgs {
    /// File or directory to select. Repeatable.
    #[arg(short, long = "select", value_name = "PATH")]
    select: Vec<String>,

    /// Select every scanned file.
    #[arg(long)]
    all: bool,

    /// Select the files matching a name or content query.
    #[arg(long, value_name = "QUERY")]
    search: Option<String>,

    /// Apply a saved preset.
    #[arg(long, value_name = "NAME")]
    preset: Option<String>,
}

#[derive(Debug, Args)]
struct BundleArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    selection: SelectionArgs,

    /// Export format. Defaults to the configured format.
    #[arg(short, long, value_enum)]
    format: Option<ExportFormat>,

    /// Strip comments and whitespace from file bodies.
    #[arg(long)]
    minify: bool,

    /// Write the bundle to a file instead of stdout. A directory gets `<folder>.<ext>`.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Remember the folder for `--folder`.
    #[arg(long)]
    remember: bool,
}

#[derive(Debug, Subcommand)]
enum PresetCommand {
    /// Save the selection under a name.
    Save {
        name: String,
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// List presets.
    List {
        #[arg(long)]
        project: Option<String>,
    },
    /// Delete a preset.
    Delete {
        name: String,
        #[arg(long)]
        project: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    promptpack::init(cli.verbose);

    let config = Config::load()?;
    let store = state_store(&cli, &config)?;

    match cli.command {
        Command::Bundle(args) => bundle(&config, store, args),
        Command::Preset(command) => preset(&config, store, command),
        Command::Folders => {
            let mut out = io::stdout().lock();
            for handle in store.folders()? {
                writeln!(
                    out,
                    "{}\t{}\t{}",
                    handle.label,
                    handle.path.display(),
                    handle.last_opened
                )?;
            }
            Ok(())
        }
    }
}

fn state_store(cli: &Cli, config: &Config) -> Result<JsonStateStore> {
    match cli.state.clone().or_else(|| config.store.path()) {
        Some(path) => Ok(JsonStateStore::new(path)),
        None => bail!("no state file location available; pass --state"),
    }
}

fn bundle(config: &Config, store: JsonStateStore, args: BundleArgs) -> Result<()> {
    let root = resolve_root(&store, &args.source)?;
    let config = &Config::load_for_root(&root).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "falling back to current directory configuration");
        config.clone()
    });

    let mut workspace = open_workspace(config, &store, &root, args.remember)?;
    apply_selection(&mut workspace, &store, args.source.project.as_deref(), &args.selection)?;

    let mut options = ExportOptions::from_config(config);
    if let Some(format) = args.format {
        options.format = format;
    }
    options.minify |= args.minify;

    let artifact = workspace.export(&options, None)?;
    let estimate = workspace.token_estimate();

    match &args.output {
        Some(path) => {
            let path = output_path(path, &root, options.format);
            fs::write(&path, &artifact.text)
                .with_context(|| format!("failed to write bundle to {}", path.display()))?;
            tracing::info!(path = %path.display(), "bundle written");
        }
        None => {
            let mut out = io::stdout().lock();
            out.write_all(artifact.text.as_bytes())?;
            out.write_all(b"\n")?;
        }
    }

    eprintln!(
        "{} files, ~{} tokens ({})",
        artifact.file_count,
        estimate.total,
        options.format.as_str()
    );
    if estimate.exceeds_budget() {
        eprintln!("warning: estimate exceeds the budget of {} tokens", estimate.budget);
    }
    Ok(())
}

fn preset(config: &Config, mut store: JsonStateStore, command: PresetCommand) -> Result<()> {
    match command {
        PresetCommand::Save {
            name,
            source,
            selection,
        } => {
            let root = resolve_root(&store, &source)?;
            let mut workspace = open_workspace(config, &store, &root, false)?;
            apply_selection(&mut workspace, &store, source.project.as_deref(), &selection)?;
            let Some(tree) = workspace.tree() else {
                bail!("nothing loaded");
            };
            let count = save_preset(
                &mut store,
                source.project.as_deref(),
                &name,
                tree,
                workspace.selection(),
            )?;
            eprintln!("saved preset '{name}' with {count} files");
        }
        PresetCommand::List { project } => {
            let mut out = io::stdout().lock();
            for (name, count) in list_presets(&store, project.as_deref())? {
                writeln!(out, "{name}\t{count}")?;
            }
        }
        PresetCommand::Delete { name, project } => {
            if !delete_preset(&mut store, project.as_deref(), &name)? {
                bail!("no preset named '{name}'");
            }
        }
    }
    Ok(())
}

fn output_path(output: &Path, root: &Path, format: ExportFormat) -> PathBuf {
    if !output.is_dir() {
        return output.to_path_buf();
    }
    let stem = root
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("bundle");
    output.join(format!("{stem}.{}", format.extension()))
}

fn resolve_root(store: &JsonStateStore, source: &SourceArgs) -> Result<PathBuf> {
    match (&source.root, &source.folder) {
        (Some(root), _) => Ok(root.clone()),
        (None, Some(label)) => store.reopen_folder(label),
        (None, None) => bail!("pass a folder path or --folder"),
    }
}

fn open_workspace(
    config: &Config,
    store: &JsonStateStore,
    root: &Path,
    remember: bool,
) -> Result<Workspace> {
    let scan = Scanner::new().scan(&ScannerConfig::from_config(root.to_path_buf(), config))?;
    for skipped in &scan.skipped {
        tracing::info!(path = %skipped.path, reason = ?skipped.reason, "skipped file");
    }
    if remember {
        store.remember_folder(&scan.label, &scan.root, scan.uploaded_at)?;
    }

    let mut workspace = Workspace::from_config(config)?;
    let summary = workspace.load_local(scan.label, scan.records, scan.uploaded_at)?;
    if let Some(tree) = workspace.tree() {
        for warning in tree.warnings() {
            eprintln!("warning: {warning}");
        }
    }
    tracing::debug!(files = summary.files, "folder loaded");
    Ok(workspace)
}

fn apply_selection(
    workspace: &mut Workspace,
    store: &JsonStateStore,
    project: Option<&str>,
    args: &SelectionArgs,
) -> Result<()> {
    let now = Instant::now();
    let explicit = args.all
        || args.preset.is_some()
        || args.search.is_some()
        || !args.select.is_empty();

    if args.all || !explicit {
        workspace.select_all(now);
    }
    if let Some(name) = &args.preset {
        let Some(paths) = load_preset(store, project, name)? else {
            bail!("no preset named '{name}'");
        };
        workspace.replace_selection(paths.iter().map(String::as_str), now);
    }
    if let Some(query) = &args.search {
        workspace.set_search(query);
        workspace.select_visible(now);
    }
    for path in &args.select {
        let path = path.trim_start_matches("./").trim_end_matches('/');
        if !workspace.toggle(path, true, now) {
            eprintln!("warning: '{path}' is not in the scanned tree");
        }
    }

    if workspace.selection().is_empty() {
        return Err(Notice::NoFilesSelected.into());
    }
    Ok(())
}
