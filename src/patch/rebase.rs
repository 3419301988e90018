//! The two-stage apply engine.
//!
//! A change is first rebased onto the shared validation branch. If that
//! conflicts, a probe rebase against the bare upstream tip decides who to
//! blame: applying cleanly there means the change collides with another
//! change in flight, conflicting there means the change itself is stale.
//! Every path out of the engine puts the checkout back on the validation
//! branch.

use git2::Oid;
use tracing::{debug, info, warn};

use crate::errors::{ApplyKind, PatchError, Result};
use crate::git::{GitRepository, RebaseAttempt};
use crate::manifest::{Manifest, TrackingBranch};

use super::remote::RemotePatch;
use super::PATCH_BRANCH;

/// Create the shared validation branch if the checkout lacks it.
///
/// The branch starts at the remote-tracking ref of the manifest's default
/// branch, tracks it, and is checked out, the same state `repo start`
/// leaves a fresh topic branch in.
pub(crate) fn ensure_validation_branch(
    repo: &GitRepository,
    manifest: &dyn Manifest,
    project: &str,
) -> Result<()> {
    if repo.branch_exists(PATCH_BRANCH) {
        return Ok(());
    }

    let remote = manifest.upstream_branch(project)?.remote;
    let default = TrackingBranch::new(remote, manifest.default_branch());
    let tip = repo.get_ref_tip(&default.refname())?;

    repo.create_branch_at(PATCH_BRANCH, tip)?;
    repo.set_upstream(PATCH_BRANCH, &default.short())?;
    repo.checkout_branch(PATCH_BRANCH)?;
    info!(
        "Started validation branch '{}' from {}",
        PATCH_BRANCH,
        default.short()
    );
    Ok(())
}

/// Fetch the change's patch ref, rebase it onto the validation branch, and
/// classify any conflict. The checkout ends up back on the validation
/// branch no matter which way this returns.
pub(crate) fn land_remote_patch(
    repo: &GitRepository,
    patch: &RemotePatch,
    upstream: &TrackingBranch,
    restrict_to_trivial: bool,
) -> Result<()> {
    let outcome = fetch_and_probe(repo, patch, upstream, restrict_to_trivial);

    match repo.checkout_branch(PATCH_BRANCH) {
        Ok(()) => outcome,
        Err(restore_err) => match outcome {
            // The classification is the more useful signal; report it and
            // log the failed restore.
            Err(e) => {
                warn!(
                    "Could not return to '{}' after failed apply: {}",
                    PATCH_BRANCH, restore_err
                );
                Err(e)
            }
            Ok(()) => Err(restore_err),
        },
    }
}

fn fetch_and_probe(
    repo: &GitRepository,
    patch: &RemotePatch,
    upstream: &TrackingBranch,
    restrict_to_trivial: bool,
) -> Result<()> {
    let fetched = repo.fetch_ref(&patch.fetch_url, &patch.ref_name)?;
    probe(repo, patch, fetched, upstream, restrict_to_trivial)
}

fn probe(
    repo: &GitRepository,
    patch: &RemotePatch,
    fetched: Oid,
    upstream: &TrackingBranch,
    restrict_to_trivial: bool,
) -> Result<()> {
    let upstream_tip = repo.get_ref_tip(&upstream.refname())?;
    let shared_tip = repo.get_branch_tip(PATCH_BRANCH)?;

    match repo.rebase_range(fetched, upstream_tip, shared_tip, restrict_to_trivial)? {
        RebaseAttempt::Completed(tip) => {
            repo.reset_branch_to(PATCH_BRANCH, tip)?;
            info!("Change {} applied to '{}'", patch, PATCH_BRANCH);
            Ok(())
        }
        RebaseAttempt::Conflicted => {
            debug!(
                "Change {} conflicts with '{}', probing {}",
                patch,
                PATCH_BRANCH,
                upstream.short()
            );
            let kind = match repo.rebase_range(
                fetched,
                upstream_tip,
                upstream_tip,
                restrict_to_trivial,
            )? {
                RebaseAttempt::Completed(_) => ApplyKind::RebaseAgainstInFlight,
                RebaseAttempt::Conflicted => ApplyKind::RebaseAgainstTip,
            };
            warn!("Change {} {}", patch, kind);
            Err(PatchError::apply(patch.clone(), kind))
        }
    }
}
