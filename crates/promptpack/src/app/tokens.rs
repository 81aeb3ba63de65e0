//! Token estimation services.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tiktoken_rs::{CoreBPE, cl100k_base, o200k_base};

use crate::app::content::{ContentView, is_binary_path};
use crate::app::tree::FileNode;
use crate::infra::config::Config;

/// Characters (or bytes, for unfetched content) per token in the fallback heuristic.
const CHARS_PER_TOKEN: usize = 4;

/// Supported token estimation models across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenModel {
    /// OpenAI GPT-4o (128k context window).
    OpenAiGpt4o,
    /// OpenAI GPT-4o mini.
    #[default]
    OpenAiGpt4oMini,
    /// Anthropic Claude 3.5 Sonnet, approximated with `cl100k_base`.
    AnthropicClaude35Sonnet,
    /// No tokenizer; characters divided by four.
    CharacterFallback,
}

impl TokenModel {
    /// Return a stable identifier suitable for configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenModel::OpenAiGpt4o => "openai:gpt-4o",
            TokenModel::OpenAiGpt4oMini => "openai:gpt-4o-mini",
            TokenModel::AnthropicClaude35Sonnet => "anthropic:claude-3.5-sonnet",
            TokenModel::CharacterFallback => "fallback:characters",
        }
    }
}

impl fmt::Display for TokenModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TokenModel {
    type Err = TokenModelParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "openai:gpt-4o" => Ok(TokenModel::OpenAiGpt4o),
            "openai:gpt-4o-mini" => Ok(TokenModel::OpenAiGpt4oMini),
            "anthropic:claude-3.5-sonnet" | "anthropic:claude" => {
                Ok(TokenModel::AnthropicClaude35Sonnet)
            }
            "fallback:characters" | "heuristic" | "fallback" => Ok(TokenModel::CharacterFallback),
            other => Err(TokenModelParseError::UnknownModel(other.to_string())),
        }
    }
}

/// Error returned when parsing a [`TokenModel`] fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TokenModelParseError {
    #[error("unknown token model '{0}'")]
    UnknownModel(String),
}

/// Exact tokenization strategy injected into the estimator.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> Result<usize, TokenizerError>;
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    #[error("failed to initialize tokenizer: {0}")]
    Init(String),
    #[error("tokenization failed: {0}")]
    Encode(String),
}

/// Byte-pair tokenizer backed by `tiktoken-rs`.
pub struct BpeTokenizer {
    bpe: Arc<Mutex<CoreBPE>>,
}

impl BpeTokenizer {
    /// Tokenizer for the model, or `None` when the model is the character heuristic.
    pub fn for_model(model: TokenModel) -> Result<Option<Self>, TokenizerError> {
        let bpe = match model {
            TokenModel::OpenAiGpt4o | TokenModel::OpenAiGpt4oMini => gpt4o_bpe()?,
            TokenModel::AnthropicClaude35Sonnet => claude_bpe()?,
            TokenModel::CharacterFallback => return Ok(None),
        };
        Ok(Some(Self { bpe }))
    }
}

impl Tokenizer for BpeTokenizer {
    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.bpe.lock().encode_ordinary(text).len())
    }
}

fn gpt4o_bpe() -> Result<Arc<Mutex<CoreBPE>>, TokenizerError> {
    static GPT4O: OnceLock<Result<Arc<Mutex<CoreBPE>>, TokenizerError>> = OnceLock::new();
    GPT4O
        .get_or_init(|| {
            o200k_base()
                .map(|bpe| Arc::new(Mutex::new(bpe)))
                .map_err(|err| TokenizerError::Init(err.to_string()))
        })
        .clone()
}

fn claude_bpe() -> Result<Arc<Mutex<CoreBPE>>, TokenizerError> {
    static CLAUDE: OnceLock<Result<Arc<Mutex<CoreBPE>>, TokenizerError>> = OnceLock::new();
    CLAUDE
        .get_or_init(|| {
            cl100k_base()
                .map(|bpe| Arc::new(Mutex::new(bpe)))
                .map_err(|err| TokenizerError::Init(err.to_string()))
        })
        .clone()
}

/// `ceil(n / 4)`.
fn heuristic(n: usize) -> usize {
    n.div_ceil(CHARS_PER_TOKEN)
}

/// Running token estimate for a selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenEstimate {
    pub total: usize,
    /// Tokens counted by the tokenizer.
    pub exact_tokens: usize,
    /// Tokens derived from character or byte heuristics.
    pub estimated_tokens: usize,
    pub exact_files: usize,
    pub estimated_files: usize,
    pub budget: u32,
}

impl TokenEstimate {
    pub fn exceeds_budget(&self) -> bool {
        self.budget > 0 && self.total > self.budget as usize
    }
}

/// Token estimation engine with an optional exact tokenizer and a per-file cache.
#[derive(Clone)]
pub struct TokenEstimator {
    tokenizer: Option<Arc<dyn Tokenizer>>,
    token_budget: u32,
    cache: Arc<Mutex<HashMap<CacheKey, usize>>>,
}

impl fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEstimator")
            .field("exact", &self.tokenizer.is_some())
            .field("token_budget", &self.token_budget)
            .finish()
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TokenEstimator {
    pub fn new(tokenizer: Option<Arc<dyn Tokenizer>>) -> Self {
        Self {
            tokenizer,
            token_budget: 120_000,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Initialize from the layered configuration. A tokenizer that fails to load degrades to
    /// the heuristic.
    pub fn from_config(config: &Config) -> Self {
        let model = config
            .defaults
            .model()
            .parse()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to default token model");
                TokenModel::default()
            });
        let tokenizer = match BpeTokenizer::for_model(model) {
            Ok(found) => found.map(|bpe| Arc::new(bpe) as Arc<dyn Tokenizer>),
            Err(err) => {
                tracing::warn!(error = %err, "tokenizer unavailable, using heuristic");
                None
            }
        };
        let mut estimator = Self::new(tokenizer);
        estimator.token_budget = config.defaults.token_budget();
        estimator
    }

    pub fn token_budget(&self) -> u32 {
        self.token_budget
    }

    pub fn has_tokenizer(&self) -> bool {
        self.tokenizer.is_some()
    }

    /// Estimate the given files using whatever content is already at hand. Never performs I/O
    /// and never fails; unknown paths contribute nothing.
    pub fn estimate<'a>(
        &self,
        view: ContentView<'_>,
        paths: impl IntoIterator<Item = &'a str>,
    ) -> TokenEstimate {
        let mut estimate = TokenEstimate {
            budget: self.token_budget,
            ..TokenEstimate::default()
        };

        for path in paths {
            let Some(file) = view.tree.find_file(path) else {
                continue;
            };
            match self.estimate_file(view, file) {
                FileEstimate::Exact(tokens) => {
                    estimate.exact_tokens += tokens;
                    estimate.exact_files += 1;
                }
                FileEstimate::Estimated(tokens) => {
                    estimate.estimated_tokens += tokens;
                    estimate.estimated_files += 1;
                }
            }
        }

        estimate.total = estimate.exact_tokens + estimate.estimated_tokens;
        tracing::debug!(total = estimate.total, "token estimate updated");
        estimate
    }

    fn estimate_file(&self, view: ContentView<'_>, file: &FileNode) -> FileEstimate {
        if is_binary_path(&file.path) {
            return FileEstimate::Estimated(0);
        }
        match view.text(file) {
            Some(text) => self.count_text(&file.path, text),
            None => FileEstimate::Estimated(heuristic(file.byte_size.unwrap_or(0) as usize)),
        }
    }

    fn count_text(&self, path: &str, text: &str) -> FileEstimate {
        let Some(tokenizer) = &self.tokenizer else {
            return FileEstimate::Estimated(heuristic(text.chars().count()));
        };

        let key = CacheKey {
            path: path.to_owned(),
            fingerprint: fingerprint(text),
        };
        if let Some(tokens) = self.cache.lock().get(&key).copied() {
            return FileEstimate::Exact(tokens);
        }

        match tokenizer.count(text) {
            Ok(tokens) => {
                self.cache.lock().insert(key, tokens);
                FileEstimate::Exact(tokens)
            }
            Err(err) => {
                tracing::debug!(path, error = %err, "tokenizer failed, using heuristic");
                FileEstimate::Estimated(heuristic(text.chars().count()))
            }
        }
    }

    /// Forget every cached count.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

enum FileEstimate {
    Exact(usize),
    Estimated(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: String,
    fingerprint: (usize, u64),
}

fn fingerprint(text: &str) -> (usize, u64) {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    (text.len(), hasher.finish())
}

/// Delays recomputation until the selection has been quiet for a short window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending_since: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending_since: None,
        }
    }

    /// Record a change; restarts the quiet window.
    pub fn mark(&mut self, now: Instant) {
        self.pending_since = Some(now);
    }

    /// Returns `true` once, when the quiet window has elapsed since the last change.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.pending_since {
            Some(since) if now.saturating_duration_since(since) >= self.delay => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }
}
