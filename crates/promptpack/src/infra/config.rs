//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::{config_dir, data_dir};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".promptpack/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub local: Local,
    #[serde(default)]
    pub tokens: Tokens,
    #[serde(default)]
    pub store: Store,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "Defaults::default_model")]
    model: String,
    #[serde(default = "Defaults::default_export_format")]
    export_format: String,
    #[serde(default = "Defaults::default_token_budget")]
    token_budget: u32,
    #[serde(default)]
    minify: Option<bool>,
}

impl Defaults {
    fn default_model() -> String {
        "openai:gpt-4o-mini".to_owned()
    }

    fn default_export_format() -> String {
        "full-code".into()
    }

    fn default_token_budget() -> u32 {
        120_000
    }

    /// Token model identifier, e.g. `openai:gpt-4o`.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn export_format(&self) -> &str {
        &self.export_format
    }

    pub fn token_budget(&self) -> u32 {
        self.token_budget
    }

    pub fn minify(&self) -> bool {
        self.minify.unwrap_or(false)
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            export_format: Self::default_export_format(),
            token_budget: Self::default_token_budget(),
            minify: None,
        }
    }
}

/// Filters applied by the local folder scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
    /// Folder names skipped wherever they appear.
    #[serde(default)]
    pub excluded_folders: Vec<String>,
    /// Extensions (without the dot) to include. Empty means every extension.
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    #[serde(default)]
    max_file_size: Option<u64>,
}

impl Local {
    fn default_max_file_size() -> u64 {
        1024 * 1024
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
            .unwrap_or_else(Self::default_max_file_size)
    }
}

impl Default for Local {
    fn default() -> Self {
        Self {
            excluded_folders: vec![
                ".git".into(),
                "node_modules".into(),
                "target".into(),
                "dist".into(),
            ],
            allowed_extensions: Vec::new(),
            max_file_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// Quiet window before the estimate is recomputed after a selection change.
    #[serde(default = "Tokens::default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Tokens {
    fn default_debounce_ms() -> u64 {
        50
    }
}

impl Default for Tokens {
    fn default() -> Self {
        Self {
            debounce_ms: Self::default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Store {
    /// State file for presets and folder handles.
    #[serde(default)]
    path: Option<PathBuf>,
}

impl Store {
    /// Configured state file, else `<data dir>/promptpack/state.json`.
    pub fn path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| data_dir().map(|base| base.join("promptpack/state.json")))
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    model: Option<String>,
    token_budget: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            model: env::var("PROMPTPACK_MODEL").ok(),
            token_budget: env::var("PROMPTPACK_TOKEN_BUDGET").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(model: &str, token_budget: &str) -> Self {
        Self {
            model: Some(model.to_owned()),
            token_budget: Some(token_budget.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration for the current directory.
    pub fn load() -> Result<Self> {
        let cwd = env::current_dir().context("failed to resolve current directory")?;
        Self::load_for_root(&cwd)
    }

    /// Load configuration from defaults, global config, the workspace config of the repository
    /// containing `start`, and env overrides.
    pub fn load_for_root(start: &Path) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path(start);
        Self::load_with_layers(global, Some(workspace), env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::parse(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("in {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).context("failed to parse TOML config")?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            defaults: merge_defaults(self.defaults, other.defaults),
            local: merge_local(self.local, other.local),
            tokens: merge_tokens(self.tokens, other.tokens),
            store: Store {
                path: other.store.path.or(self.store.path),
            },
        }
    }
}

fn merge_defaults(base: Defaults, overlay: Defaults) -> Defaults {
    Defaults {
        model: if overlay.model != Defaults::default_model() {
            overlay.model
        } else {
            base.model
        },
        export_format: if overlay.export_format != Defaults::default_export_format() {
            overlay.export_format
        } else {
            base.export_format
        },
        token_budget: if overlay.token_budget != Defaults::default_token_budget() {
            overlay.token_budget
        } else {
            base.token_budget
        },
        minify: overlay.minify.or(base.minify),
    }
}

fn merge_local(base: Local, overlay: Local) -> Local {
    let mut excluded: BTreeSet<String> = base.excluded_folders.into_iter().collect();
    excluded.extend(overlay.excluded_folders);

    // An allow-list only narrows when a layer names one explicitly.
    let allowed_extensions = if overlay.allowed_extensions.is_empty() {
        base.allowed_extensions
    } else {
        overlay.allowed_extensions
    };

    Local {
        excluded_folders: excluded.into_iter().collect(),
        allowed_extensions,
        max_file_size: overlay.max_file_size.or(base.max_file_size),
    }
}

fn merge_tokens(base: Tokens, overlay: Tokens) -> Tokens {
    Tokens {
        debounce_ms: if overlay.debounce_ms != Tokens::default_debounce_ms() {
            overlay.debounce_ms
        } else {
            base.debounce_ms
        },
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("promptpack/config.toml"))
}

fn workspace_config_path(start: &Path) -> PathBuf {
    let root = find_repo_root(start).unwrap_or_else(|| start.to_path_buf());
    root.join(DEFAULT_WORKSPACE_CONFIG_PATH)
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(model) = env.model {
        config.defaults.model = model;
    }
    if let Some(raw) = env.token_budget {
        match raw.trim().parse::<u32>() {
            Ok(budget) => config.defaults.token_budget = budget,
            Err(err) => {
                tracing::warn!(
                    value = %raw,
                    error = %err,
                    "ignoring invalid PROMPTPACK_TOKEN_BUDGET"
                )
            }
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.defaults.model(), "openai:gpt-4o-mini");
        assert_eq!(config.defaults.export_format(), "full-code");
        assert_eq!(config.tokens.debounce_ms, 50);
        assert!(config.local.excluded_folders.contains(&"node_modules".into()));
        assert_eq!(config.local.max_file_size(), 1024 * 1024);
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[defaults]
model = "anthropic:claude"
[local]
excluded_folders = ["generated"]
allowed_extensions = ["rs", "toml"]
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".promptpack"))?;
        fs::create_dir_all(workspace_dir.join(".git"))?;
        fs::write(
            workspace_dir.join(".promptpack/config.toml"),
            r#"
[defaults]
export_format = "markdown"
minify = true
[tokens]
debounce_ms = 200
"#,
        )?;

        let nested = workspace_dir.join("src/deep");
        fs::create_dir_all(&nested)?;
        let workspace_path = Some(workspace_config_path(&nested));

        let config =
            Config::load_with_layers(Some(global), workspace_path, EnvOverrides::default())?;

        assert_eq!(config.defaults.model(), "anthropic:claude");
        assert_eq!(config.defaults.export_format(), "markdown");
        assert!(config.defaults.minify());
        assert_eq!(config.tokens.debounce_ms, 200);
        assert!(config.local.excluded_folders.contains(&"generated".into()));
        assert!(config.local.excluded_folders.contains(&"target".into()));
        assert_eq!(config.local.allowed_extensions, vec!["rs", "toml"]);
        Ok(())
    }

    #[test]
    fn workspace_layer_without_local_keeps_global_limits() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            "[defaults]\nminify = true\n[local]\nmax_file_size = 2048\n",
        )?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(&workspace, "[defaults]\nexport_format = \"tree\"\n")?;

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;
        assert_eq!(config.local.max_file_size(), 2048);
        assert!(config.defaults.minify());
        assert_eq!(config.defaults.export_format(), "tree");
        Ok(())
    }

    #[test]
    fn workspace_layer_can_turn_minify_off() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(&global, "[defaults]\nminify = true\n")?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(&workspace, "[defaults]\nminify = false\n")?;

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;
        assert!(!config.defaults.minify());
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("fallback:characters", "5000");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.defaults.model(), "fallback:characters");
        assert_eq!(config.defaults.token_budget(), 5000);
        Ok(())
    }

    #[test]
    fn invalid_budget_override_is_ignored() -> Result<()> {
        let overrides = EnvOverrides::for_tests("openai:gpt-4o", "lots");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.defaults.token_budget(), 120_000);
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        assert!(Config::from_file(&file).is_err());
        Ok(())
    }

    #[test]
    fn store_path_prefers_configured_value() {
        let config: Config = toml::from_str("[store]\npath = \"/tmp/state.json\"").unwrap();
        assert_eq!(config.store.path(), Some(PathBuf::from("/tmp/state.json")));
    }
}
