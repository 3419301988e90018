//! Patch entities and the engine that applies them to project checkouts.

pub mod deps;
pub mod format;
pub mod local;
mod rebase;
pub mod remote;
pub mod staging;

pub use local::LocalPatch;
pub use remote::{dedup_patches, RemotePatch, REJECTION_MESSAGE};
pub use staging::{prepare_local_patches, remove_staging_root, STAGING_PREFIX};

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PatchError, Result};
use crate::manifest::Manifest;

/// Name of the shared branch changes are stacked on for validation
pub const PATCH_BRANCH: &str = "patch-validation";

/// A change to validate, wherever it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Patch {
    /// A change fetched from a review server
    Remote(RemotePatch),
    /// A developer branch staged as patch files
    Local(LocalPatch),
}

impl Patch {
    /// Review project the patch belongs to
    pub fn project(&self) -> &str {
        match self {
            Patch::Remote(patch) => &patch.project,
            Patch::Local(patch) => &patch.project,
        }
    }

    /// The branch the patch is destined for
    pub fn tracking_branch(&self) -> &str {
        match self {
            Patch::Remote(patch) => &patch.tracking_branch,
            Patch::Local(patch) => &patch.tracking_branch,
        }
    }

    /// Local directory under `buildroot` the patch will be applied in
    pub fn checkout_path(&self, manifest: &dyn Manifest, buildroot: &Path) -> Result<PathBuf> {
        Ok(buildroot.join(manifest.project_path(self.project())?))
    }

    /// Apply the patch to its project checkout under `buildroot`.
    ///
    /// `restrict_to_trivial` refuses commits that need a content-level
    /// merge; it only makes sense for remote patches and is rejected for
    /// local ones.
    pub fn apply(
        &self,
        manifest: &dyn Manifest,
        buildroot: &Path,
        restrict_to_trivial: bool,
    ) -> Result<()> {
        match self {
            Patch::Remote(patch) => patch.apply(manifest, buildroot, restrict_to_trivial),
            Patch::Local(patch) => {
                if restrict_to_trivial {
                    return Err(PatchError::validation(
                        "Local patches cannot be applied in trivial mode",
                    ));
                }
                patch.apply(manifest, buildroot)
            }
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Patch::Remote(patch) => patch.fmt(f),
            Patch::Local(patch) => patch.fmt(f),
        }
    }
}

impl From<RemotePatch> for Patch {
    fn from(patch: RemotePatch) -> Self {
        Patch::Remote(patch)
    }
}

impl From<LocalPatch> for Patch {
    fn from(patch: LocalPatch) -> Self {
        Patch::Local(patch)
    }
}
