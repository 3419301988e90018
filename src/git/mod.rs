//! Git repository plumbing built on libgit2.

pub mod repository;

pub use repository::{GitRepository, RebaseAttempt};
