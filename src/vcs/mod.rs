//! Version-control capabilities used by the synchronizer.
//!
//! The synchronizer only needs a handful of operations, each scoped to one
//! working directory. [`GitCli`] implements them against the host's `git`.

pub mod command;
mod git;

pub use git::GitCli;

use crate::error::CommandFailure;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Branch names per remote, e.g. `{"origin": {"main", "develop"}}`.
pub type RemoteBranches = BTreeMap<String, BTreeSet<String>>;

pub trait VersionControl: Send + Sync {
    fn is_repository(&self, path: &Path) -> bool;

    /// `Some(description)` when the working copy has uncommitted changes.
    fn is_dirty(&self, path: &Path) -> Result<Option<String>, CommandFailure>;

    fn hard_reset(&self, path: &Path) -> Result<(), CommandFailure>;

    fn clean(&self, path: &Path) -> Result<(), CommandFailure>;

    fn add_remote(&self, path: &Path, name: &str, url: &str) -> Result<(), CommandFailure>;

    fn remove_remote(&self, path: &Path, name: &str) -> Result<(), CommandFailure>;

    /// Fetches `refspecs` and all tags from `remote`.
    fn fetch(&self, path: &Path, remote: &str, refspecs: &[String]) -> Result<(), CommandFailure>;

    fn checkout(&self, path: &Path, reference: &str) -> Result<(), CommandFailure>;

    /// Creates local branch `branch` at `start_point` and checks it out.
    fn create_branch(
        &self,
        path: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), CommandFailure>;

    /// Returns the command output, which callers scan for `Updating A..B`.
    fn fast_forward_pull(
        &self,
        path: &Path,
        remote: &str,
        reference: &str,
    ) -> Result<String, CommandFailure>;

    fn remote_branch_names(&self, path: &Path) -> Result<RemoteBranches, CommandFailure>;

    fn default_remote(&self, path: &Path) -> String;
}
