//! Applies code-review patches onto git project checkouts for validation
//! builds.
//!
//! Changes come either from a review server ([`RemotePatch`], resolved via a
//! [`ChangeQuery`]) or from a developer's local branches staged as patch
//! files ([`LocalPatch`]). Applying stacks them on a shared validation
//! branch in the project checkout, and conflicts are classified so a run
//! can tell a stale change from one that collides with another change in
//! flight.
//!
//! Checkouts are plain git state; nothing here locks them. Run at most one
//! apply at a time per checkout.

pub mod errors;
pub mod gerrit;
pub mod git;
pub mod manifest;
pub mod patch;

pub use errors::{ApplyKind, PatchError, Result};
pub use gerrit::{ChangeMetadata, ChangeQuery, GerritEndpoints, QueryToken};
pub use manifest::{Manifest, StaticManifest, TrackingBranch};
pub use patch::{LocalPatch, Patch, RemotePatch, PATCH_BRANCH};
