use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{PatchError, Result};
use crate::gerrit::{ChangeMetadata, ChangeStatus, GerritEndpoints};
use crate::git::GitRepository;
use crate::manifest::Manifest;

use super::{deps, rebase};

/// Guidance handed back to an owner whose change was rejected
pub const REJECTION_MESSAGE: &str = "Please re-sync, rebase, and re-upload your change.";

/// A change fetched from a review server.
///
/// Everything needed to fetch and apply the current patch set is captured
/// at construction; the struct is treated as immutable from then on, and
/// all mutation happens in the project checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePatch {
    /// Review project the change belongs to
    pub project: String,
    /// Branch on the review server the change is destined for
    pub tracking_branch: String,
    /// Change-Id trailer value; identity of the change
    pub change_id: String,
    /// Ref the current patch set is fetched from, e.g. `refs/changes/44/2144/3`
    pub ref_name: String,
    /// Commit SHA-1 of the current patch set
    pub revision: String,
    /// Patch set number, as reported by the server
    pub patch_set_number: String,
    /// Local part of the owner's email address
    pub owner: String,
    /// Server-assigned change number
    pub gerrit_number: String,
    /// Web URL of the change
    pub url: String,
    /// True when the change lives on the internal review server
    pub internal: bool,
    /// Lifecycle state at query time
    pub status: ChangeStatus,
    /// URL the patch ref is fetched from
    pub fetch_url: String,
}

impl RemotePatch {
    /// Build a patch from a query record
    pub fn from_metadata(
        change: &ChangeMetadata,
        internal: bool,
        endpoints: &GerritEndpoints,
    ) -> Self {
        let owner = match change.owner.email.split_once('@') {
            Some((local, _)) => local.to_string(),
            None => change.owner.email.clone(),
        };

        Self {
            project: change.project.clone(),
            tracking_branch: change.branch.clone(),
            change_id: change.id.clone(),
            ref_name: change.current_patch_set.ref_name.clone(),
            revision: change.current_patch_set.revision.clone(),
            patch_set_number: change.current_patch_set.number.clone(),
            owner,
            gerrit_number: change.number.clone(),
            url: change.url.clone(),
            internal,
            status: change.status,
            fetch_url: endpoints.project_url(&change.project, internal),
        }
    }

    /// True when the review server already merged this change
    pub fn is_already_merged(&self) -> bool {
        self.status == ChangeStatus::Merged
    }

    /// What to tell the owner when this patch is rejected
    pub fn rejection_message(&self) -> &'static str {
        REJECTION_MESSAGE
    }

    /// Fetch the current patch set and rebase it onto the shared validation
    /// branch of the project checkout under `buildroot`.
    ///
    /// On success the checkout is left on the validation branch with this
    /// change on top. On a conflict the failure is classified by a second
    /// rebase against the upstream tip and the checkout is restored.
    pub fn apply(
        &self,
        manifest: &dyn Manifest,
        buildroot: &Path,
        restrict_to_trivial: bool,
    ) -> Result<()> {
        info!("Applying change {}", self);
        let repo = self.open_checkout(manifest, buildroot)?;
        rebase::ensure_validation_branch(&repo, manifest, &self.project)?;
        let upstream = manifest.upstream_branch(&self.project)?;
        rebase::land_remote_patch(&repo, self, &upstream, restrict_to_trivial)
    }

    /// Change-Ids this patch implicitly depends on.
    ///
    /// These are the commits below the patch set that upstream does not
    /// have yet, nearest ancestor first. Every one of them must carry a
    /// Change-Id trailer.
    pub fn gerrit_dependencies(
        &self,
        manifest: &dyn Manifest,
        buildroot: &Path,
    ) -> Result<Vec<String>> {
        let repo = self.open_checkout(manifest, buildroot)?;
        let fetched = repo.fetch_ref(&self.fetch_url, &self.ref_name)?;

        let parent = match repo.get_first_parent(fetched)? {
            Some(parent) => parent,
            None => return Ok(Vec::new()),
        };

        let upstream = manifest.upstream_branch(&self.project)?;
        let upstream_tip = repo.get_ref_tip(&upstream.refname())?;

        let mut dependencies = Vec::new();
        for oid in repo.get_commits_between(upstream_tip, parent)? {
            let message = repo.get_commit_message(oid)?;
            match deps::change_id_trailer(&message) {
                Some(change_id) => dependencies.push(change_id),
                None => return Err(PatchError::missing_change_id(message)),
            }
        }

        if !dependencies.is_empty() {
            info!("Change {} depends on {:?}", self, dependencies);
        }
        Ok(dependencies)
    }

    /// Change references named in `CQ-DEPEND=` lines of the commit message
    pub fn paladin_dependencies(
        &self,
        manifest: &dyn Manifest,
        buildroot: &Path,
    ) -> Result<Vec<String>> {
        let message = self.commit_message(manifest, buildroot)?;
        let dependencies = deps::cq_depend_tokens(&message);
        if !dependencies.is_empty() {
            info!("Change {} requests {:?} via CQ-DEPEND", self, dependencies);
        }
        Ok(dependencies)
    }

    /// Commit message of the current patch set
    pub fn commit_message(&self, manifest: &dyn Manifest, buildroot: &Path) -> Result<String> {
        let repo = self.open_checkout(manifest, buildroot)?;
        let fetched = repo.fetch_ref(&self.fetch_url, &self.ref_name)?;
        repo.get_commit_message(fetched)
    }

    fn open_checkout(&self, manifest: &dyn Manifest, buildroot: &Path) -> Result<GitRepository> {
        let path = buildroot.join(manifest.project_path(&self.project)?);
        GitRepository::open(&path)
    }
}

/// Two patches are the same change if their Change-Ids match, whatever
/// patch set or server they came from.
impl PartialEq for RemotePatch {
    fn eq(&self, other: &Self) -> bool {
        self.change_id == other.change_id
    }
}

impl Eq for RemotePatch {}

impl Hash for RemotePatch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.change_id.hash(state);
    }
}

impl fmt::Display for RemotePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.gerrit_number)
    }
}

/// Drop later duplicates of the same change, keeping first-seen order.
///
/// Distinct query tokens may resolve to one change; the run should still
/// apply it once.
pub fn dedup_patches(patches: Vec<RemotePatch>) -> Vec<RemotePatch> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for patch in patches {
        if seen.insert(patch.change_id.clone()) {
            unique.push(patch);
        }
    }
    unique
}
