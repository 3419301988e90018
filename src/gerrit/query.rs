use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{PatchError, Result};

use super::ChangeMetadata;

/// One change reference as supplied to a validation run.
///
/// A leading `*` marks a change living on the internal review server and is
/// stripped from the stored text. The remainder is either a bare change
/// number or a Change-Id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryToken {
    /// Change number or Change-Id, without the internal marker
    pub text: String,
    /// True when the token named the internal server
    pub internal: bool,
}

impl QueryToken {
    pub fn parse(raw: &str) -> Result<Self> {
        let (internal, text) = match raw.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if text.is_empty() {
            return Err(PatchError::validation(format!(
                "invalid change reference: {:?}",
                raw
            )));
        }
        Ok(Self {
            text: text.to_string(),
            internal,
        })
    }

    /// True when the token is a bare change number
    pub fn is_numeric(&self) -> bool {
        self.text.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for QueryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.internal {
            write!(f, "*{}", self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

/// A review-server client that resolves change references to metadata.
///
/// Implementations must return exactly one record per resolvable token,
/// routing internal tokens to the internal server, and fail with
/// [`PatchError::Query`] when a token matches no change or more than one.
/// Tokens naming the same change may be answered from one lookup; callers
/// dedup the results by Change-Id.
pub trait ChangeQuery {
    fn query_changes(&self, tokens: &[QueryToken]) -> Result<Vec<ChangeMetadata>>;
}
