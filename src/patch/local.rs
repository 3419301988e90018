use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{ApplyKind, PatchError, Result};
use crate::git::GitRepository;
use crate::manifest::Manifest;

use super::format::PatchFile;
use super::{rebase, PATCH_BRANCH};

/// A developer branch staged as a directory of mailbox patch files.
///
/// Built by [`prepare_local_patches`](super::prepare_local_patches); the
/// patch files live on until the staging root is removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPatch {
    /// Review project the patches belong to
    pub project: String,
    /// Remote branch the developer's branch tracks, e.g. `cros/master`
    pub tracking_branch: String,
    /// Directory holding this patch's rendered files
    pub patch_dir: PathBuf,
    /// Name of the developer's local branch
    pub local_branch: String,
}

impl LocalPatch {
    pub fn new<P, T, B>(project: P, tracking_branch: T, patch_dir: PathBuf, local_branch: B) -> Self
    where
        P: Into<String>,
        T: Into<String>,
        B: Into<String>,
    {
        Self {
            project: project.into(),
            tracking_branch: tracking_branch.into(),
            patch_dir,
            local_branch: local_branch.into(),
        }
    }

    /// The staging root this patch was written under
    pub fn staging_root(&self) -> Option<&Path> {
        self.patch_dir.parent()
    }

    /// Rendered patch files in application order
    pub fn patch_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.patch_dir)? {
            files.push(entry?.path());
        }
        files.sort();
        Ok(files)
    }

    /// Commit the staged series onto the shared validation branch of the
    /// project checkout under `buildroot`.
    ///
    /// The branch the patches were staged from must track the same remote
    /// branch the manifest pins for the project. Any failure while applying
    /// is reported as an unclassified apply failure.
    pub fn apply(&self, manifest: &dyn Manifest, buildroot: &Path) -> Result<()> {
        let expected = manifest.upstream_branch(&self.project)?.short();
        if self.tracking_branch != expected {
            return Err(PatchError::validation(format!(
                "Branch '{}' of project '{}' tracks '{}', but the manifest wants '{}'",
                self.local_branch, self.project, self.tracking_branch, expected
            )));
        }

        info!("Applying {}", self);
        let path = buildroot.join(manifest.project_path(&self.project)?);
        let repo = GitRepository::open(&path)?;

        if let Err(e) = self.apply_series(&repo, manifest) {
            warn!("Could not apply {}: {}", self, e);
            return Err(PatchError::apply(self.clone(), ApplyKind::Unclassified));
        }
        Ok(())
    }

    fn apply_series(&self, repo: &GitRepository, manifest: &dyn Manifest) -> Result<()> {
        rebase::ensure_validation_branch(repo, manifest, &self.project)?;
        repo.checkout_branch(PATCH_BRANCH)?;

        let result = self.commit_patch_files(repo);

        // Committing moves the branch without touching the worktree; bring
        // the worktree back in line with wherever HEAD ended up.
        if let Err(sync_err) = repo.force_checkout_head() {
            if result.is_ok() {
                return Err(sync_err);
            }
            warn!("Could not refresh worktree after failed apply: {}", sync_err);
        }
        result
    }

    fn commit_patch_files(&self, repo: &GitRepository) -> Result<()> {
        let files = self.patch_files()?;
        if files.is_empty() {
            return Err(PatchError::validation(format!(
                "No patch files in {}",
                self.patch_dir.display()
            )));
        }

        for file in files {
            let text = std::fs::read_to_string(&file)?;
            let patch = PatchFile::parse(&text)?;
            repo.apply_patch_file(&patch)?;
        }
        Ok(())
    }
}

impl fmt::Display for LocalPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project, self.local_branch)
    }
}
