use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Lifecycle state of a change on the review server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeStatus {
    New,
    Submitted,
    Merged,
    Abandoned,
}

/// The account that uploaded a change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOwner {
    /// Display name, when the server knows one
    #[serde(default)]
    pub name: Option<String>,
    /// Registered email address
    pub email: String,
}

/// The patch set a query reports as current
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSetInfo {
    /// Patch set number, string-encoded by the server
    pub number: String,
    /// Commit SHA-1 of the patch set
    pub revision: String,
    /// Ref the patch set is fetched from, e.g. `refs/changes/44/2144/3`
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// One change record as returned by a review-server query.
///
/// Field names follow the server's JSON; unknown keys are ignored so the
/// model survives server-side additions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMetadata {
    /// Project the change was uploaded against
    pub project: String,
    /// Destination branch of the change
    pub branch: String,
    /// Change-Id trailer value
    pub id: String,
    /// Server-assigned change number, string-encoded
    pub number: String,
    /// First line of the commit message
    #[serde(default)]
    pub subject: Option<String>,
    /// Uploader of the change
    pub owner: ChangeOwner,
    /// Web URL of the change
    pub url: String,
    /// Seconds since the epoch of the last server-side update
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Lifecycle state
    pub status: ChangeStatus,
    /// Patch set the query considers current
    pub current_patch_set: PatchSetInfo,
}

impl ChangeMetadata {
    /// Parse a single change record from query JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
