use std::fmt;

use crate::patch::Patch;

/// How an apply failure was classified by the two-stage rebase probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ApplyKind {
    /// The change no longer applies to the tip of its upstream branch.
    RebaseAgainstTip,
    /// The change applies upstream but collides with another change that
    /// is already staged on the validation branch.
    RebaseAgainstInFlight,
    /// The change could not be applied and no probe was run.
    Unclassified,
}

impl fmt::Display for ApplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ApplyKind::RebaseAgainstTip => "does not apply to the upstream tip",
            ApplyKind::RebaseAgainstInFlight => "conflicts with another change in flight",
            ApplyKind::Unclassified => "could not be applied",
        };
        write!(f, "{}", text)
    }
}

/// Patchgate Error Types
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A patch failed to apply to its project checkout
    #[error("Failed to apply patch {patch}: change {kind}")]
    Apply { patch: Box<Patch>, kind: ApplyKind },

    /// A commit in a dependency chain has no Change-Id trailer
    #[error("Missing Change-Id in commit message:\n{description}")]
    MissingChangeId { description: String },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A project is not listed in the manifest
    #[error("Unknown project: {0}")]
    UnknownProject(String),

    /// Change query errors
    #[error("Query error: {0}")]
    Query(String),
}

impl PatchError {
    pub fn apply(patch: impl Into<Patch>, kind: ApplyKind) -> Self {
        PatchError::Apply {
            patch: Box::new(patch.into()),
            kind,
        }
    }

    pub fn missing_change_id<S: Into<String>>(description: S) -> Self {
        PatchError::MissingChangeId {
            description: description.into(),
        }
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        PatchError::Validation(msg.into())
    }

    pub fn unknown_project<S: Into<String>>(name: S) -> Self {
        PatchError::UnknownProject(name.into())
    }

    pub fn query<S: Into<String>>(msg: S) -> Self {
        PatchError::Query(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PatchError>;
