//! Commit-message parsing for dependency tracking.

use once_cell::sync::Lazy;
use regex::Regex;

static CHANGE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Change-Id:\s*(\S+)\s*$").unwrap());

static CQ_DEPEND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^CQ-DEPEND=(.*)$").unwrap());

static CQ_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

/// Extract the `Change-Id:` trailer from a commit message.
///
/// The keyword is case sensitive, leading whitespace is tolerated, and the
/// first matching line wins.
pub fn change_id_trailer(message: &str) -> Option<String> {
    CHANGE_ID_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|token| token.as_str().to_string())
}

/// Extract commit-queue dependencies from `CQ-DEPEND=` annotation lines.
///
/// The keyword must start its line. Every annotation line in the message
/// contributes, in order, and each maximal alphanumeric run on a line is
/// one dependency token.
pub fn cq_depend_tokens(message: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for caps in CQ_DEPEND_RE.captures_iter(message) {
        let value = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        for token in CQ_TOKEN_RE.find_iter(value) {
            tokens.push(token.as_str().to_string());
        }
    }
    tokens
}
