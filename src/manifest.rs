use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PatchError, Result};

/// A remote-tracking branch, e.g. `origin/master`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingBranch {
    /// Name of the git remote
    pub remote: String,
    /// Branch name on that remote
    pub branch: String,
}

impl TrackingBranch {
    pub fn new<R: Into<String>, B: Into<String>>(remote: R, branch: B) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    /// Short name as git prints it, e.g. `origin/master`
    pub fn short(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }

    /// Full remote-tracking ref, e.g. `refs/remotes/origin/master`
    pub fn refname(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }
}

impl fmt::Display for TrackingBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.remote, self.branch)
    }
}

/// Maps review project names onto a checked-out source tree.
///
/// The apply engine never guesses where a project lives or what it tracks;
/// every lookup goes through this trait so embedders can back it with a
/// repo manifest, a workspace config file, or a fixture.
pub trait Manifest {
    /// Path of the project's checkout relative to the tree root
    fn project_path(&self, project: &str) -> Result<PathBuf>;

    /// The remote-tracking branch the project's patches rebase onto
    fn upstream_branch(&self, project: &str) -> Result<TrackingBranch>;

    /// The branch name checkouts were synced to, e.g. `master`
    fn default_branch(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestProject {
    path: PathBuf,
    upstream: TrackingBranch,
}

/// In-memory [`Manifest`] built from explicit project entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticManifest {
    default_branch: String,
    projects: HashMap<String, ManifestProject>,
}

impl StaticManifest {
    pub fn new<S: Into<String>>(default_branch: S) -> Self {
        Self {
            default_branch: default_branch.into(),
            projects: HashMap::new(),
        }
    }

    /// Register a project at `path` tracking `remote/branch`
    pub fn add_project<N, P, R, B>(&mut self, name: N, path: P, remote: R, branch: B) -> &mut Self
    where
        N: Into<String>,
        P: AsRef<Path>,
        R: Into<String>,
        B: Into<String>,
    {
        self.projects.insert(
            name.into(),
            ManifestProject {
                path: path.as_ref().to_path_buf(),
                upstream: TrackingBranch::new(remote, branch),
            },
        );
        self
    }

    fn project(&self, name: &str) -> Result<&ManifestProject> {
        self.projects
            .get(name)
            .ok_or_else(|| PatchError::unknown_project(name))
    }
}

impl Manifest for StaticManifest {
    fn project_path(&self, project: &str) -> Result<PathBuf> {
        Ok(self.project(project)?.path.clone())
    }

    fn upstream_branch(&self, project: &str) -> Result<TrackingBranch> {
        Ok(self.project(project)?.upstream.clone())
    }

    fn default_branch(&self) -> &str {
        &self.default_branch
    }
}
