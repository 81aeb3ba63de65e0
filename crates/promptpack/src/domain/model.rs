//! Domain models for sources, records, and export artifacts.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Where the files of the active tree come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Local,
    GitHub,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::GitHub => "github",
        }
    }
}

/// Repository coordinates used both for fetching and for identity comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoIdentity {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoIdentity {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

/// Describes the loaded source together with its freshness marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContext {
    Local {
        /// Name of the chosen folder.
        label: String,
        /// Captured once per processing run.
        uploaded_at: OffsetDateTime,
    },
    GitHub {
        repo: RepoIdentity,
        head_commit_at: Option<OffsetDateTime>,
        truncated: bool,
    },
}

impl SourceContext {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceContext::Local { .. } => SourceKind::Local,
            SourceContext::GitHub { .. } => SourceKind::GitHub,
        }
    }

    /// Identity tuple deciding whether a reload keeps selection and expansion.
    pub fn identity(&self) -> SourceIdentity {
        match self {
            SourceContext::Local { label, .. } => SourceIdentity::Local(label.clone()),
            SourceContext::GitHub { repo, .. } => SourceIdentity::GitHub(repo.clone()),
        }
    }

    /// Timestamp surfaced as the snapshot freshness badge.
    pub fn snapshot_at(&self) -> Option<OffsetDateTime> {
        match self {
            SourceContext::Local { uploaded_at, .. } => Some(*uploaded_at),
            SourceContext::GitHub { head_commit_at, .. } => *head_commit_at,
        }
    }

    /// Human readable identity used in summaries.
    pub fn display_label(&self) -> String {
        match self {
            SourceContext::Local { label, .. } => label.clone(),
            SourceContext::GitHub { repo, .. } => repo.to_string(),
        }
    }

    pub fn repo(&self) -> Option<&RepoIdentity> {
        match self {
            SourceContext::GitHub { repo, .. } => Some(repo),
            SourceContext::Local { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceIdentity {
    Local(String),
    GitHub(RepoIdentity),
}

/// A file produced by the local source adapter, content already in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRecord {
    pub path: String,
    pub line_count: usize,
    pub content: String,
    pub byte_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteEntryKind {
    File,
    Directory,
    /// Submodules, symlinks and anything else the listing reports.
    Other,
}

/// One entry of a remote tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub path: String,
    pub kind: RemoteEntryKind,
    #[serde(default)]
    pub byte_size: Option<u64>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl RemoteRecord {
    pub fn file(path: impl Into<String>, byte_size: u64, content_hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: RemoteEntryKind::File,
            byte_size: Some(byte_size),
            content_hash: Some(content_hash.into()),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: RemoteEntryKind::Directory,
            byte_size: None,
            content_hash: None,
        }
    }
}

/// Full listing returned by the remote tree adapter for one repository branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTreeListing {
    pub entries: Vec<RemoteRecord>,
    #[serde(default)]
    pub truncated: bool,
    /// ISO-8601 timestamp of the branch head commit.
    #[serde(default)]
    pub head_commit_at: Option<String>,
}

impl RemoteTreeListing {
    /// Parse the head commit timestamp, ignoring values that are not RFC 3339.
    pub fn head_commit_time(&self) -> Option<OffsetDateTime> {
        let raw = self.head_commit_at.as_deref()?;
        match OffsetDateTime::parse(raw.trim(), &Rfc3339) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(value = raw, error = %err, "unparseable head commit timestamp");
                None
            }
        }
    }
}

/// Generated export text. Never persisted by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub format: crate::app::export::ExportFormat,
    pub text: String,
    pub file_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_freshness_and_truncation() {
        let repo = RepoIdentity::new("octo", "hello", "main");
        let first = SourceContext::GitHub {
            repo: repo.clone(),
            head_commit_at: None,
            truncated: false,
        };
        let second = SourceContext::GitHub {
            repo,
            head_commit_at: Some(OffsetDateTime::UNIX_EPOCH),
            truncated: true,
        };
        assert_eq!(first.identity(), second.identity());
        assert_eq!(first.display_label(), "octo/hello@main");
    }

    #[test]
    fn head_commit_time_parses_rfc3339_and_tolerates_garbage() {
        let mut listing = RemoteTreeListing {
            head_commit_at: Some("2024-05-01T12:30:00Z".into()),
            ..Default::default()
        };
        let parsed = listing.head_commit_time().expect("timestamp");
        assert_eq!(parsed.hour(), 12);

        listing.head_commit_at = Some("yesterday".into());
        assert!(listing.head_commit_time().is_none());
    }
}
