//! Staging developer branches as patch-file series.

use std::path::{Path, PathBuf};

use tempfile::Builder;
use tracing::{debug, info};

use crate::errors::{PatchError, Result};
use crate::git::GitRepository;
use crate::manifest::{Manifest, TrackingBranch};

use super::local::LocalPatch;

/// Prefix every staging root is created with; deletion refuses anything else
pub const STAGING_PREFIX: &str = "trybot_patch-";

/// Stage local branches as mailbox patch series under a fresh staging root.
///
/// Each token names a branch as `project:branch`, resolved in the developer
/// workspace at `workspace`. One numbered subdirectory is created per token
/// holding one patch file per commit the branch has over the manifest's
/// default branch, oldest first. Tokens are staged independently and in
/// order; a failure leaves earlier tokens' files in place.
///
/// The staging root outlives this call. Hand it (via
/// [`LocalPatch::staging_root`]) to [`remove_staging_root`] once the run is
/// done with the files.
pub fn prepare_local_patches(
    manifest: &dyn Manifest,
    workspace: &Path,
    tokens: &[String],
) -> Result<Vec<LocalPatch>> {
    let root = create_staging_root()?;
    let mut patches = Vec::new();

    for (index, token) in tokens.iter().enumerate() {
        let (project, branch) = token.split_once(':').ok_or_else(|| {
            PatchError::validation(format!(
                "Local patches take the form project:branch, got '{}'",
                token
            ))
        })?;

        let checkout = workspace.join(manifest.project_path(project)?);
        let repo = GitRepository::open(&checkout)?;

        let patch_dir = root.join(index.to_string());
        std::fs::create_dir_all(&patch_dir)?;

        let remote = manifest.upstream_branch(project)?.remote;
        let default = TrackingBranch::new(remote, manifest.default_branch());
        let base = repo.get_ref_tip(&default.refname())?;
        let tip = repo.get_branch_tip(branch)?;

        let mut commits = repo.get_commits_between(base, tip)?;
        commits.reverse(); // oldest first, the order they apply in
        if commits.is_empty() {
            return Err(PatchError::validation(format!(
                "No changes found in {}:{}",
                project, branch
            )));
        }

        for (number, oid) in commits.iter().enumerate() {
            let patch = repo.export_commit(*oid)?;
            let path = patch_dir.join(patch.file_name(number + 1));
            std::fs::write(&path, patch.render())?;
            debug!("Wrote {}", path.display());
        }

        let tracking = repo.get_tracking_branch(branch)?.ok_or_else(|| {
            PatchError::validation(format!(
                "Branch {}:{} needs to track a remote branch to be staged",
                project, branch
            ))
        })?;

        info!("Staged {} commit(s) from {}:{}", commits.len(), project, branch);
        patches.push(LocalPatch::new(project, tracking, patch_dir, branch));
    }

    Ok(patches)
}

/// Delete a staging root created by [`prepare_local_patches`].
///
/// Only directories carrying the staging prefix are deleted; anything else
/// is a validation error, untouched.
pub fn remove_staging_root(root: &Path) -> Result<()> {
    let name = root.file_name().and_then(|name| name.to_str()).unwrap_or("");
    if !name.starts_with(STAGING_PREFIX) {
        return Err(PatchError::validation(format!(
            "Refusing to delete '{}': not a staging root",
            root.display()
        )));
    }
    std::fs::remove_dir_all(root)?;
    debug!("Removed staging root {}", root.display());
    Ok(())
}

fn create_staging_root() -> Result<PathBuf> {
    let dir = Builder::new().prefix(STAGING_PREFIX).tempdir()?;
    // The root is handed to the caller; it is cleaned up explicitly, not
    // when this handle drops.
    Ok(dir.keep())
}
