//! Mailbox patch files, the `git format-patch` / `git am` interchange text.
//!
//! Staged local patches are written in this format and read back when they
//! are applied, so the files also work with stock git tooling.

use chrono::{DateTime, FixedOffset};

use crate::errors::{PatchError, Result};

/// Longest subject slug git puts in a patch file name
const MAX_SLUG_LEN: usize = 52;

/// One commit serialized as a mailbox patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchFile {
    pub author_name: String,
    pub author_email: String,
    pub date: DateTime<FixedOffset>,
    /// First line of the commit message
    pub subject: String,
    /// Rest of the commit message, without the blank separator line
    pub body: String,
    /// Unified diff against the commit's first parent
    pub diff: String,
}

impl PatchFile {
    /// Split a commit message into subject and body
    pub fn split_message(message: &str) -> (String, String) {
        let mut parts = message.splitn(2, '\n');
        let subject = parts.next().unwrap_or("").trim().to_string();
        let body = parts.next().unwrap_or("").trim().to_string();
        (subject, body)
    }

    /// Reassemble the full commit message
    pub fn message(&self) -> String {
        if self.body.is_empty() {
            format!("{}\n", self.subject)
        } else {
            format!("{}\n\n{}\n", self.subject, self.body)
        }
    }

    /// File name for this patch at position `number` in a series,
    /// e.g. `0001-Add-user-auth.patch`
    pub fn file_name(&self, number: usize) -> String {
        let slug = Self::slug(&self.subject);
        if slug.is_empty() {
            format!("{:04}.patch", number)
        } else {
            format!("{:04}-{}.patch", number, slug)
        }
    }

    fn slug(subject: &str) -> String {
        let mut slug = String::new();
        for ch in subject.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch);
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        slug.trim_end_matches('-').chars().take(MAX_SLUG_LEN).collect()
    }

    /// Serialize to mailbox text
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("From 0000000000000000000000000000000000000000 Mon Sep 17 00:00:00 2001\n");
        out.push_str(&format!(
            "From: {} <{}>\n",
            self.author_name, self.author_email
        ));
        out.push_str(&format!("Date: {}\n", self.date.to_rfc2822()));
        out.push_str(&format!("Subject: [PATCH] {}\n", self.subject));
        out.push('\n');
        if !self.body.is_empty() {
            out.push_str(&self.body);
            out.push('\n');
        }
        out.push_str("---\n");
        out.push_str(&self.diff);
        if !self.diff.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Parse mailbox text, including files produced by `git format-patch`.
    ///
    /// The diffstat between the `---` separator and the first `diff --git`
    /// line is skipped, as is a trailing signature block.
    pub fn parse(text: &str) -> Result<Self> {
        let mut author: Option<(String, String)> = None;
        let mut date: Option<DateTime<FixedOffset>> = None;
        let mut subject: Option<String> = None;

        let mut lines = text.lines();
        for line in &mut lines {
            if line.is_empty() {
                break;
            }
            if let Some(rest) = line.strip_prefix("From: ") {
                author = Some(Self::parse_address(rest));
            } else if let Some(rest) = line.strip_prefix("Date: ") {
                let parsed = DateTime::parse_from_rfc2822(rest.trim()).map_err(|e| {
                    PatchError::validation(format!("Invalid Date header {:?}: {}", rest, e))
                })?;
                date = Some(parsed);
            } else if let Some(rest) = line.strip_prefix("Subject: ") {
                subject = Some(Self::strip_subject_tag(rest).to_string());
            }
        }

        let (author_name, author_email) =
            author.ok_or_else(|| PatchError::validation("Patch has no From header"))?;
        let date = date.ok_or_else(|| PatchError::validation("Patch has no Date header"))?;
        let subject =
            subject.ok_or_else(|| PatchError::validation("Patch has no Subject header"))?;

        let mut body_lines: Vec<&str> = Vec::new();
        let mut diff_lines: Vec<&str> = Vec::new();
        let mut in_diff = false;
        let mut past_separator = false;
        for line in lines {
            if in_diff {
                // "-- " starts the signature trailer.
                if line == "-- " {
                    break;
                }
                diff_lines.push(line);
            } else if line.starts_with("diff --git ") {
                in_diff = true;
                diff_lines.push(line);
            } else if line == "---" {
                past_separator = true;
            } else if !past_separator {
                body_lines.push(line);
            }
        }

        if diff_lines.is_empty() {
            return Err(PatchError::validation("Patch has no diff content"));
        }

        Ok(Self {
            author_name,
            author_email,
            date,
            subject,
            body: body_lines.join("\n").trim().to_string(),
            diff: format!("{}\n", diff_lines.join("\n")),
        })
    }

    /// Split `Name <email>` into its parts
    fn parse_address(value: &str) -> (String, String) {
        if let Some(start) = value.rfind('<') {
            if let Some(end) = value.rfind('>') {
                if start < end {
                    return (
                        value[..start].trim().to_string(),
                        value[start + 1..end].to_string(),
                    );
                }
            }
        }
        (String::new(), value.trim().to_string())
    }

    /// Drop a leading `[PATCH ...]` tag from a subject line
    fn strip_subject_tag(subject: &str) -> &str {
        if subject.starts_with('[') {
            if let Some(end) = subject.find(']') {
                return subject[end + 1..].trim_start();
            }
        }
        subject.trim()
    }
}
