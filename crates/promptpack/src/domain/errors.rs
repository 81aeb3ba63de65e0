//! Domain-specific errors and user-facing notices.

use thiserror::Error;

/// Conditions that short-circuit an operation with a visible notice instead of failing.
///
/// None of these leave the workspace in a broken state; the caller shows the message and
/// continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Notice {
    #[error("no files matched the current filters")]
    NoMatchingFiles,
    #[error("select at least one file before exporting")]
    NoFilesSelected,
    #[error("the suggestion service returned no files")]
    AdvisorySuggestionEmpty,
    #[error("none of the {returned} suggested paths exist in the current tree")]
    AdvisorySuggestionInvalid { returned: usize },
    #[error("the suggestion service failed: {0}")]
    AdvisorySuggestionFailed(String),
    #[error("folder '{0}' is no longer accessible, please select it again")]
    StaleHandle(String),
}

/// Problems detected while building a tree. Recovered locally and kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeWarning {
    #[error("path '{path}' is claimed by both a file and a directory; keeping the directory")]
    PathConflict { path: String },
    #[error("skipped malformed path '{raw}'")]
    MalformedPath { raw: String },
}
