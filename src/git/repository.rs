use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Commit, Diff, DiffFormat, ErrorCode, Oid, RebaseOptions, Repository, Signature,
};
use tracing::{debug, warn};

use crate::errors::{PatchError, Result};
use crate::patch::format::PatchFile;

/// Outcome of replaying a commit range onto a new base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseAttempt {
    /// Every commit landed; holds the new tip
    Completed(Oid),
    /// A commit could not be replayed and the rebase was backed out
    Conflicted,
}

/// Wrapper around git2::Repository with safe operations
pub struct GitRepository {
    repo: Repository,
    path: PathBuf,
}

impl GitRepository {
    /// Open a Git repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| PatchError::validation(format!("Not a git repository: {}", e)))?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| PatchError::validation("Repository has no working directory"))?
            .to_path_buf();

        Ok(Self {
            repo,
            path: workdir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the current branch name
    pub fn get_current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;

        if let Some(name) = head.shorthand() {
            Ok(name.to_string())
        } else {
            // Detached HEAD - return commit hash
            let commit = head.peel_to_commit()?;
            Ok(format!("HEAD@{}", commit.id()))
        }
    }

    /// Check if a local branch exists
    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, BranchType::Local).is_ok()
    }

    /// Get the commit a local branch points at
    pub fn get_branch_tip(&self, name: &str) -> Result<Oid> {
        let branch = self.repo.find_branch(name, BranchType::Local)?;
        let commit = branch.get().peel_to_commit()?;
        Ok(commit.id())
    }

    /// Resolve a full refname, e.g. `refs/remotes/cros/master`, to a commit id
    pub fn get_ref_tip(&self, refname: &str) -> Result<Oid> {
        Ok(self.repo.refname_to_id(refname)?)
    }

    /// Create a local branch pointing at `target`
    pub fn create_branch_at(&self, name: &str, target: Oid) -> Result<()> {
        let commit = self.repo.find_commit(target)?;
        self.repo.branch(name, &commit, false)?;
        debug!("Created branch '{}' at {}", name, target);
        Ok(())
    }

    /// Move an existing local branch to `target` without touching the worktree
    pub fn reset_branch_to(&self, name: &str, target: Oid) -> Result<()> {
        let commit = self.repo.find_commit(target)?;
        self.repo.branch(name, &commit, true)?;
        debug!("Branch '{}' now at {}", name, target);
        Ok(())
    }

    /// Set the upstream of a local branch, e.g. to `cros/master`
    pub fn set_upstream(&self, branch: &str, upstream: &str) -> Result<()> {
        let mut branch = self.repo.find_branch(branch, BranchType::Local)?;
        branch.set_upstream(Some(upstream))?;
        Ok(())
    }

    /// Short name of the remote branch a local branch tracks, if any
    pub fn get_tracking_branch(&self, branch: &str) -> Result<Option<String>> {
        let branch = self.repo.find_branch(branch, BranchType::Local)?;
        match branch.upstream() {
            Ok(upstream) => Ok(upstream.name()?.map(|name| name.to_string())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Switch to a branch
    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        let branch = self.repo.find_branch(name, BranchType::Local)?;
        let tree = branch.get().peel_to_tree()?;

        self.repo.checkout_tree(tree.as_object(), None)?;
        self.repo.set_head(&format!("refs/heads/{}", name))?;

        debug!("Switched to branch '{}'", name);
        Ok(())
    }

    /// Make the worktree match HEAD, discarding local differences
    pub fn force_checkout_head(&self) -> Result<()> {
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo.checkout_head(Some(&mut checkout))?;
        Ok(())
    }

    /// Fetch a single ref from `url` and return the commit it points at.
    ///
    /// The fetch is anonymous; nothing about the remote is recorded in the
    /// repository beyond FETCH_HEAD, and fetching the same ref twice is
    /// harmless.
    pub fn fetch_ref(&self, url: &str, refname: &str) -> Result<Oid> {
        debug!("Fetching {} from {}", refname, url);
        let mut remote = self.repo.remote_anonymous(url)?;
        remote.fetch(&[refname], None, None)?;

        let fetch_head = self.repo.find_reference("FETCH_HEAD")?;
        Ok(fetch_head.peel_to_commit()?.id())
    }

    /// Commits reachable from `to` but not from `from`, newest first
    pub fn get_commits_between(&self, from: Oid, to: Oid) -> Result<Vec<Oid>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(to)?;
        revwalk.hide(from)?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            commits.push(oid?);
        }
        Ok(commits)
    }

    /// Full commit message, lossily decoded
    pub fn get_commit_message(&self, oid: Oid) -> Result<String> {
        let commit = self.repo.find_commit(oid)?;
        Ok(String::from_utf8_lossy(commit.message_bytes()).into_owned())
    }

    /// First id listed as a parent of `oid`, or None for a root commit
    pub fn get_first_parent(&self, oid: Oid) -> Result<Option<Oid>> {
        let commit = self.repo.find_commit(oid)?;
        if commit.parent_count() > 0 {
            Ok(Some(commit.parent_id(0)?))
        } else {
            Ok(None)
        }
    }

    /// Replay the commits in `upstream..head` onto `onto`.
    ///
    /// Runs on the real worktree, the same as a command-line rebase, and is
    /// always backed out before a conflict is reported so the checkout never
    /// stays mid-rebase. When `restrict_to_trivial` is set, a commit that
    /// rewrites any file already changed on the target side counts as a
    /// conflict even if git could merge it.
    pub fn rebase_range(
        &self,
        head: Oid,
        upstream: Oid,
        onto: Oid,
        restrict_to_trivial: bool,
    ) -> Result<RebaseAttempt> {
        let guarded_paths = if restrict_to_trivial {
            Some(self.changed_paths_since_base(head, onto)?)
        } else {
            None
        };

        let head_commit = self.repo.find_annotated_commit(head)?;
        let upstream_commit = self.repo.find_annotated_commit(upstream)?;
        let onto_commit = self.repo.find_annotated_commit(onto)?;

        let mut options = RebaseOptions::new();
        let mut rebase = self.repo.rebase(
            Some(&head_commit),
            Some(&upstream_commit),
            Some(&onto_commit),
            Some(&mut options),
        )?;

        let committer = self.get_signature()?;
        let mut tip = onto;

        while let Some(operation) = rebase.next() {
            let original = match operation {
                Ok(op) => op.id(),
                Err(e) => {
                    if let Err(abort_err) = rebase.abort() {
                        warn!("Could not abort failed rebase: {}", abort_err);
                    }
                    return Err(e.into());
                }
            };

            let mut index = self.repo.index()?;
            index.read(false)?;
            if index.has_conflicts() {
                debug!("Commit {} does not replay cleanly, backing out", original);
                rebase.abort()?;
                return Ok(RebaseAttempt::Conflicted);
            }

            if let Some(ref guarded) = guarded_paths {
                let commit = self.repo.find_commit(original)?;
                let touched = self.commit_touched_paths(&commit)?;
                if touched.iter().any(|path| guarded.contains(path)) {
                    debug!(
                        "Commit {} rewrites files already changed on the target, backing out",
                        original
                    );
                    rebase.abort()?;
                    return Ok(RebaseAttempt::Conflicted);
                }
            }

            match rebase.commit(None, &committer, None) {
                Ok(oid) => tip = oid,
                // The target already contains this change; skip it.
                Err(e) if e.code() == ErrorCode::Applied => continue,
                Err(e) => {
                    if let Err(abort_err) = rebase.abort() {
                        warn!("Could not abort failed rebase: {}", abort_err);
                    }
                    return Err(e.into());
                }
            }
        }

        rebase.finish(Some(&committer))?;
        Ok(RebaseAttempt::Completed(tip))
    }

    /// Render the first-parent diff of a commit as unified patch text
    pub fn get_commit_patch_text(&self, oid: Oid) -> Result<String> {
        let commit = self.repo.find_commit(oid)?;
        let diff = self.commit_diff(&commit)?;

        let mut text = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            match line.origin() {
                '+' | '-' | ' ' => text.push(line.origin()),
                _ => {}
            }
            text.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(text)
    }

    /// Export a commit as a mailbox patch file
    pub fn export_commit(&self, oid: Oid) -> Result<PatchFile> {
        let commit = self.repo.find_commit(oid)?;
        let author = commit.author();
        let when = author.when();
        let offset = FixedOffset::east_opt(when.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
        let date = DateTime::from_timestamp(when.seconds(), 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
            .with_timezone(&offset);

        let message = String::from_utf8_lossy(commit.message_bytes()).into_owned();
        let (subject, body) = PatchFile::split_message(&message);

        Ok(PatchFile {
            author_name: String::from_utf8_lossy(author.name_bytes()).into_owned(),
            author_email: String::from_utf8_lossy(author.email_bytes()).into_owned(),
            date,
            subject,
            body,
            diff: self.get_commit_patch_text(oid)?,
        })
    }

    /// Commit a mailbox patch on top of HEAD, preserving its author.
    ///
    /// The diff is applied against the HEAD tree, so the branch ref moves
    /// but the worktree is left alone; callers re-sync it once a series is
    /// done.
    pub fn apply_patch_file(&self, patch: &PatchFile) -> Result<Oid> {
        let diff = Diff::from_buffer(patch.diff.as_bytes())?;
        let head = self.repo.head()?.peel_to_commit()?;
        let head_tree = head.tree()?;

        let mut index = self.repo.apply_to_tree(&head_tree, &diff, None)?;
        if index.has_conflicts() {
            return Err(PatchError::validation(format!(
                "Patch '{}' does not apply cleanly",
                patch.subject
            )));
        }

        let tree_id = index.write_tree_to(&self.repo)?;
        let tree = self.repo.find_tree(tree_id)?;

        let when = git2::Time::new(
            patch.date.timestamp(),
            patch.date.offset().local_minus_utc() / 60,
        );
        let author = Signature::new(&patch.author_name, &patch.author_email, &when)?;
        let committer = self.get_signature()?;

        let oid = self.repo.commit(
            Some("HEAD"),
            &author,
            &committer,
            &patch.message(),
            &tree,
            &[&head],
        )?;
        debug!("Applied '{}' as {}", patch.subject, oid);
        Ok(oid)
    }

    /// Get a signature for commits
    fn get_signature(&self) -> Result<Signature> {
        // Try to get signature from Git config
        if let Ok(config) = self.repo.config() {
            if let (Ok(name), Ok(email)) = (
                config.get_string("user.name"),
                config.get_string("user.email"),
            ) {
                return Ok(Signature::now(&name, &email)?);
            }
        }

        // Fallback to default signature
        Ok(Signature::now("patchgate", "patchgate@example.com")?)
    }

    fn commit_diff(&self, commit: &Commit) -> Result<Diff<'_>> {
        let tree = commit.tree()?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree()?)
        } else {
            None
        };
        Ok(self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?)
    }

    /// Paths changed on the target side between the fork point and `onto`
    fn changed_paths_since_base(&self, head: Oid, onto: Oid) -> Result<HashSet<PathBuf>> {
        let base = self.repo.merge_base(head, onto)?;
        let base_tree = self.repo.find_commit(base)?.tree()?;
        let onto_tree = self.repo.find_commit(onto)?.tree()?;
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&base_tree), Some(&onto_tree), None)?;
        Ok(Self::delta_paths(&diff))
    }

    fn commit_touched_paths(&self, commit: &Commit) -> Result<HashSet<PathBuf>> {
        Ok(Self::delta_paths(&self.commit_diff(commit)?))
    }

    fn delta_paths(diff: &Diff) -> HashSet<PathBuf> {
        let mut paths = HashSet::new();
        for delta in diff.deltas() {
            if let Some(path) = delta.old_file().path() {
                paths.insert(path.to_path_buf());
            }
            if let Some(path) = delta.new_file().path() {
                paths.insert(path.to_path_buf());
            }
        }
        paths
    }
}
