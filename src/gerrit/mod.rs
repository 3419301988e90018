pub mod change;
pub mod query;

pub use change::{ChangeMetadata, ChangeOwner, ChangeStatus, PatchSetInfo};
pub use query::{ChangeQuery, QueryToken};

use serde::{Deserialize, Serialize};

/// Base URLs of the public and internal review servers.
///
/// Fetch URLs for a change are formed by appending the project name to one
/// of these bases. The values are treated as opaque prefixes, so a plain
/// filesystem path works too and the tests rely on that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GerritEndpoints {
    /// Anonymous fetch base for public changes
    pub external_url: String,
    /// Fetch base for internal changes
    pub internal_url: String,
}

impl Default for GerritEndpoints {
    fn default() -> Self {
        Self {
            external_url: "https://review.example.com/p".to_string(),
            internal_url: "ssh://review-int.example.com:29418".to_string(),
        }
    }
}

impl GerritEndpoints {
    /// Fetch URL for `project` on the server the change lives on
    pub fn project_url(&self, project: &str, internal: bool) -> String {
        let base = if internal {
            &self.internal_url
        } else {
            &self.external_url
        };
        format!("{}/{}", base.trim_end_matches('/'), project)
    }
}
