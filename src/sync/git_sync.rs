//! Non-destructive update of an install path that is already a working copy.
//!
//! The cached checkout is attached as a transient remote, fetched, and the
//! working copy is fast-forwarded to the target ref. Local edits are never
//! discarded unless destructive mode is on.

use crate::error::{CommandFailure, Error, Result};
use crate::module::{ModuleName, Outcome};
use crate::vcs::VersionControl;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

static UPDATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Updating\s+([0-9a-fA-F]+)\.\.([0-9a-fA-F]+)").expect("valid updating regex")
});

pub(crate) struct GitSync<'a> {
    pub vcs: &'a dyn VersionControl,
    pub name: &'a ModuleName,
    pub install_path: &'a Path,
    /// Repository holding the cached module; becomes the transient remote's url.
    pub cache_repo: &'a Path,
    pub reference: &'a str,
    pub destructive: bool,
}

impl GitSync<'_> {
    pub fn run(self, mut outcome: Outcome) -> Result<Outcome> {
        let path = self.install_path;

        if self.destructive {
            tracing::debug!(module = %self.name, "resetting {}", path.display());
            self.vcs.hard_reset(path).map_err(|e| Error::sync(self.name, e))?;
            self.vcs.clean(path).map_err(|e| Error::sync(self.name, e))?;
        }

        if let Some(changes) = self.vcs.is_dirty(path).map_err(|e| Error::sync(self.name, e))? {
            return Ok(outcome.skip(format!(
                "{} is dirty ({}), skipping {}",
                path.display(),
                changes,
                self.name
            )));
        }

        let upstream = Upstream::of(self.vcs, self.cache_repo, self.name);
        let remote_name = transient_remote_name(self.cache_repo);
        let url = self.cache_repo.to_string_lossy();
        let remote = TransientRemote::add(self.vcs, path, &remote_name, &url)
            .map_err(|e| Error::sync(self.name, e))?;

        self.vcs
            .fetch(path, &remote_name, &[upstream.fetch_refspec(&remote_name)])
            .map_err(|e| Error::sync(self.name, e))?;
        self.checkout(&upstream, &remote_name)?;

        let target = upstream.pull_target(self.reference);
        match self.vcs.fast_forward_pull(path, &remote_name, &target) {
            Ok(output) => {
                if let Some(revision) = parse_updated_revision(&output) {
                    tracing::info!(module = %self.name, "Updated to {}", revision);
                    outcome.revision = Some(revision);
                } else {
                    tracing::debug!(module = %self.name, "already up to date");
                }
            }
            Err(e) => outcome.warn(format!(
                "Fast-forward of {} to {} failed, leaving it at its current revision: {}",
                self.name, target, e
            )),
        }

        if let Err(e) = remote.finish() {
            outcome.warn(format!(
                "Could not remove remote {} from {}: {}",
                remote_name,
                path.display(),
                e
            ));
        }
        Ok(outcome)
    }

    /// Checks out the target ref. A branch the working copy has never had is
    /// created from the transient remote's copy of the upstream branch.
    fn checkout(&self, upstream: &Upstream, remote_name: &str) -> Result<()> {
        let path = self.install_path;
        match self.vcs.checkout(path, self.reference) {
            Ok(()) => Ok(()),
            Err(e) if upstream.tracks(self.reference) => {
                tracing::debug!(
                    module = %self.name,
                    "no local branch {} ({}), creating it",
                    self.reference,
                    e
                );
                let start_point = format!("{}/{}", remote_name, self.reference);
                self.vcs
                    .create_branch(path, self.reference, &start_point)
                    .map_err(|e| Error::sync(self.name, e))
            }
            Err(e) => Err(Error::sync(self.name, e)),
        }
    }
}

/// Branches the cache repository knows from its default remote.
///
/// The cache is kept on a detached HEAD and only its remote-tracking refs are
/// refreshed, so those are what the working copy fetches and pulls from.
struct Upstream {
    remote: String,
    branches: BTreeSet<String>,
}

impl Upstream {
    fn of(vcs: &dyn VersionControl, cache_repo: &Path, name: &ModuleName) -> Self {
        let remote = vcs.default_remote(cache_repo);
        let branches = vcs
            .remote_branch_names(cache_repo)
            .unwrap_or_else(|e| {
                tracing::debug!(module = %name, "cannot list remote branches: {}", e);
                Default::default()
            })
            .remove(&remote)
            .unwrap_or_default();
        Self { remote, branches }
    }

    fn tracks(&self, reference: &str) -> bool {
        self.branches.contains(reference)
    }

    /// Maps the cache's upstream branches (or its own heads, when it has no
    /// upstream) to `refs/remotes/<transient>/*` in the working copy.
    fn fetch_refspec(&self, transient: &str) -> String {
        if self.branches.is_empty() {
            format!("+refs/heads/*:refs/remotes/{}/*", transient)
        } else {
            format!("+refs/remotes/{}/*:refs/remotes/{}/*", self.remote, transient)
        }
    }

    /// Branch names on the cache's default remote are qualified as `remote/branch`;
    /// anything else is taken as an absolute revision.
    fn pull_target(&self, reference: &str) -> String {
        if self.tracks(reference) {
            format!("{}/{}", self.remote, reference)
        } else {
            reference.to_string()
        }
    }
}

/// Remote that exists only for the duration of one sync. Removed on `finish`,
/// or on drop when an error cut the sync short.
struct TransientRemote<'a> {
    vcs: &'a dyn VersionControl,
    path: &'a Path,
    name: String,
    active: bool,
}

impl<'a> TransientRemote<'a> {
    fn add(
        vcs: &'a dyn VersionControl,
        path: &'a Path,
        name: &str,
        url: &str,
    ) -> std::result::Result<Self, CommandFailure> {
        match vcs.add_remote(path, name, url) {
            Ok(()) => {}
            Err(e) if e.already_exists() => {
                tracing::debug!("remote {} already exists in {}", name, path.display());
            }
            Err(e) => return Err(e),
        }
        Ok(Self {
            vcs,
            path,
            name: name.to_string(),
            active: true,
        })
    }

    fn finish(mut self) -> std::result::Result<(), CommandFailure> {
        self.active = false;
        self.vcs.remove_remote(self.path, &self.name)
    }
}

impl Drop for TransientRemote<'_> {
    fn drop(&mut self) {
        if self.active
            && let Err(e) = self.vcs.remove_remote(self.path, &self.name)
        {
            tracing::warn!(
                "Could not remove remote {} from {}: {}",
                self.name,
                self.path.display(),
                e
            );
        }
    }
}

/// Stable per cache path, so a remote leftover from an interrupted run is reused.
pub(crate) fn transient_remote_name(cache_repo: &Path) -> String {
    let digest = Sha256::digest(cache_repo.to_string_lossy().as_bytes());
    format!("modsync-{}", &format!("{:x}", digest)[..12])
}

/// Extracts the new revision from `git pull` output (`Updating a1b2c3..d4e5f6`).
pub fn parse_updated_revision(output: &str) -> Option<String> {
    UPDATING.captures(output).map(|caps| caps[2].to_string())
}
