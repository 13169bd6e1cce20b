//! Module sources and the cache step that materializes them locally.
//!
//! - **Local**: a directory relative to the project root, used in place.
//! - **Git**: cloned once into `<cache>/git/<hash>`, with the requested ref checked out.
//! - **Forge**: read from `<cache>/forge/<org-name>/<version>`. Downloading from the
//!   registry belongs to the registry client, not to this crate.

use crate::config::Environment;
use crate::error::{Error, Result};
use crate::module::ModuleName;
use crate::vcs::command;
use git2::build::RepoBuilder;
use git2::{FetchOptions, RemoteCallbacks, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const DEFAULT_REF: &str = "master";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Local,
    VersionControlled,
    Forge,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    Local {
        path: PathBuf,
    },
    Git {
        uri: String,
        reference: Option<String>,
        /// Subdirectory of the repository that holds the module.
        path: Option<String>,
    },
    Forge {
        url: String,
    },
}

impl Source {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Source::Local { path: path.into() }
    }

    pub fn git(uri: impl Into<String>, reference: Option<String>, path: Option<String>) -> Self {
        Source::Git {
            uri: uri.into(),
            reference,
            path,
        }
    }

    pub fn forge(url: impl Into<String>) -> Self {
        Source::Forge { url: url.into() }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Local { .. } => SourceKind::Local,
            Source::Git { .. } => SourceKind::VersionControlled,
            Source::Forge { .. } => SourceKind::Forge,
        }
    }

    pub fn is_forge(&self) -> bool {
        self.kind() == SourceKind::Forge
    }

    /// Branch name or absolute revision the working copy should track.
    pub fn target_ref(&self) -> &str {
        match self {
            Source::Git {
                reference: Some(r), ..
            } => r.as_str(),
            Source::Git { .. } => DEFAULT_REF,
            _ => "HEAD",
        }
    }

    /// Repository-relative path recorded on the source, if any.
    pub fn relative_path(&self) -> Option<&str> {
        match self {
            Source::Git { path, .. } => path.as_deref(),
            _ => None,
        }
    }

    /// The local directory backing this source (the git cache or the local path).
    /// Forge sources have none.
    pub fn checkout_dir(&self, env: &Environment) -> Option<PathBuf> {
        match self {
            Source::Local { path } => Some(env.project_path.join(path)),
            Source::Git { uri, .. } => Some(env.cache_root.join("git").join(cache_key(uri))),
            Source::Forge { .. } => None,
        }
    }

    pub fn is_cached(&self, env: &Environment) -> bool {
        self.checkout_dir(env).is_some_and(|dir| dir.is_dir())
    }

    /// Makes sure the module's files exist locally. With `refresh`, an existing
    /// git cache fetches `origin` before the target ref is checked out.
    pub fn cache(&self, env: &Environment, name: &ModuleName, refresh: bool) -> Result<()> {
        match self {
            Source::Local { .. } => Ok(()),
            Source::Forge { url } => {
                tracing::debug!(module = %name, forge = %url, "using forge cache");
                Ok(())
            }
            Source::Git { uri, .. } => {
                let Some(dir) = self.checkout_dir(env) else {
                    return Ok(());
                };
                let repo = open_or_clone_repo(name, uri, &dir, env.command_timeout, refresh)?;
                let reference = self.target_ref();
                let Some((oid, checkout_msg)) = select_checkout_target(&repo, reference) else {
                    return Err(Error::sync(
                        name,
                        format!("ref '{}' not found in {}", reference, uri),
                    ));
                };
                checkout_repo_target(&repo, oid, &checkout_msg)?;
                tracing::debug!(module = %name, "cache checked out at {}", checkout_msg);
                Ok(())
            }
        }
    }

    /// Concrete location holding the module's files right now, if any.
    pub fn found_path(
        &self,
        env: &Environment,
        name: &ModuleName,
        version: Option<&str>,
    ) -> Option<PathBuf> {
        let root = match self {
            Source::Local { .. } => self.checkout_dir(env)?,
            Source::Git { path, .. } => {
                let dir = self.checkout_dir(env)?;
                match path {
                    Some(sub) => dir.join(sub),
                    None => dir,
                }
            }
            Source::Forge { .. } => forge_version_dir(env, name, version)?,
        };

        [
            root.clone(),
            root.join(name.short_name()),
            root.join(name.slug()),
        ]
        .into_iter()
        .find(|candidate| looks_like_module(candidate))
    }
}

/// Heuristic only: a module usually carries one of these entries.
pub fn looks_like_module(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    ["metadata.json", "Modulefile", "manifests", "lib/puppet", "lib/facter"]
        .iter()
        .any(|entry| dir.join(entry).exists())
}

fn cache_key(uri: &str) -> String {
    let digest = Sha256::digest(uri.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..16].to_string()
}

fn forge_version_dir(env: &Environment, name: &ModuleName, version: Option<&str>) -> Option<PathBuf> {
    let module_dir = env.cache_root.join("forge").join(name.slug());
    if let Some(v) = version {
        return Some(module_dir.join(v));
    }

    // No pinned version: take the newest cached one.
    fs::read_dir(&module_dir)
        .ok()?
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            semver::Version::parse(&name).ok().map(|v| (v, entry.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}

fn open_or_clone_repo(
    name: &ModuleName,
    uri: &str,
    dir: &Path,
    timeout: Duration,
    refresh: bool,
) -> Result<Repository> {
    if dir.exists() {
        tracing::debug!(module = %name, "using cached checkout {}", dir.display());
        if refresh {
            refresh_cache(name, dir, timeout);
        }
        return Ok(Repository::open(dir)?);
    }
    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent)?;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷"),
    );
    pb.set_message(format!("Cloning {}...", name));
    pb.enable_steady_tick(Duration::from_millis(100));

    let deadline = Instant::now() + timeout;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(move |_| Instant::now() < deadline);
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);

    let cloned = RepoBuilder::new().fetch_options(fetch_options).clone(uri, dir);
    pb.finish_and_clear();
    match cloned {
        Ok(repo) => {
            tracing::info!(module = %name, "cloned {}", uri);
            Ok(repo)
        }
        Err(err) => {
            if dir.exists() {
                let _ = fs::remove_dir_all(dir);
            }
            let reason = if Instant::now() >= deadline {
                format!("timed out after {}s", timeout.as_secs())
            } else {
                err.to_string()
            };
            Err(Error::sync(name, format!("failed to clone {}: {}", uri, reason)))
        }
    }
}

/// Fetches `origin` into an existing cache. Offline is not fatal: the cached refs are used.
fn refresh_cache(name: &ModuleName, dir: &Path, timeout: Duration) {
    if let Err(e) = command::run("git", &["fetch", "--prune", "--tags", "origin"], dir, timeout) {
        tracing::warn!(module = %name, "Could not refresh cached checkout, using it as is: {}", e);
    }
}

fn select_checkout_target(repo: &Repository, reference: &str) -> Option<(git2::Oid, String)> {
    if let Ok(oid) = git2::Oid::from_str(reference)
        && repo.find_object(oid, None).is_ok()
    {
        return Some((oid, format!("commit {}", short_hash(reference))));
    }

    let tag_ref = format!("refs/tags/{}", reference);
    if let Ok(tag) = repo.find_reference(&tag_ref)
        && let Ok(commit) = tag.peel_to_commit()
    {
        return Some((commit.id(), format!("tag {}", reference)));
    }

    if let Some(oid) = find_branch_commit(repo, reference) {
        return Some((oid, format!("branch {}", reference)));
    }

    // Abbreviated hashes and other rev expressions.
    repo.revparse_single(reference)
        .ok()
        .and_then(|obj| obj.peel_to_commit().ok())
        .map(|commit| (commit.id(), format!("rev {}", reference)))
}

fn find_branch_commit(repo: &Repository, branch: &str) -> Option<git2::Oid> {
    // The cache never commits locally, so origin's view is the current one.
    let remote_ref = format!("origin/{}", branch);
    if let Ok(remote) = repo.find_branch(&remote_ref, git2::BranchType::Remote)
        && let Ok(commit) = remote.get().peel_to_commit()
    {
        return Some(commit.id());
    }

    if let Ok(local) = repo.find_branch(branch, git2::BranchType::Local)
        && let Ok(commit) = local.get().peel_to_commit()
    {
        return Some(commit.id());
    }

    None
}

pub(crate) fn short_hash(rev: &str) -> &str {
    if rev.len() > 7 { &rev[..7] } else { rev }
}

fn checkout_repo_target(repo: &Repository, oid: git2::Oid, checkout_msg: &str) -> Result<()> {
    repo.set_head_detached(oid)?;
    let obj = repo.find_object(oid, None)?;
    let mut checkout_opts = git2::build::CheckoutBuilder::new();
    checkout_opts.force();
    repo.checkout_tree(&obj, Some(&mut checkout_opts))
        .map_err(|e| git2::Error::from_str(&format!("Failed to checkout {}: {}", checkout_msg, e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_in(dir: &Path) -> Environment {
        Environment::new(dir)
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(Source::local("x").kind(), SourceKind::Local);
        assert_eq!(
            Source::git("https://example.com/x.git", None, None).kind(),
            SourceKind::VersionControlled
        );
        assert!(Source::forge("https://forgeapi.puppet.com").is_forge());
    }

    #[test]
    fn test_target_ref_defaults() {
        assert_eq!(Source::git("u", None, None).target_ref(), DEFAULT_REF);
        assert_eq!(
            Source::git("u", Some("v1.2.0".to_string()), None).target_ref(),
            "v1.2.0"
        );
        assert_eq!(Source::local("x").target_ref(), "HEAD");
    }

    #[test]
    fn test_cache_key_is_stable() {
        let a = cache_key("https://example.com/a.git");
        assert_eq!(a.len(), 16);
        assert_eq!(a, cache_key("https://example.com/a.git"));
        assert_ne!(a, cache_key("https://example.com/b.git"));
    }

    #[test]
    fn test_local_found_path_prefers_nested_module_dir() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(dir.path());
        let nested = dir.path().join("site").join("ntp");
        fs::create_dir_all(nested.join("manifests")).unwrap();

        let source = Source::local("site");
        let name = ModuleName::new("myorg-ntp");
        assert_eq!(source.found_path(&env, &name, None), Some(nested));
    }

    #[test]
    fn test_local_found_path_none_without_module_markers() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(dir.path());
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let source = Source::local("empty");
        assert!(source.found_path(&env, &ModuleName::new("x-y"), None).is_none());
        assert!(source.is_cached(&env));
    }

    #[test]
    fn test_forge_found_path_picks_newest_version() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(dir.path());
        let base = env.cache_root.join("forge").join("puppetlabs-stdlib");
        for v in ["4.9.0", "4.25.0", "not-a-version"] {
            fs::create_dir_all(base.join(v)).unwrap();
            fs::write(base.join(v).join("metadata.json"), "{}").unwrap();
        }

        let source = Source::forge("https://forgeapi.puppet.com");
        let name = ModuleName::new("puppetlabs/stdlib");
        assert_eq!(
            source.found_path(&env, &name, None),
            Some(base.join("4.25.0"))
        );
        assert_eq!(
            source.found_path(&env, &name, Some("4.9.0")),
            Some(base.join("4.9.0"))
        );
        assert!(source.found_path(&env, &name, Some("1.0.0")).is_none());
    }

    #[test]
    fn test_looks_like_module_markers() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!looks_like_module(dir.path()));
        fs::create_dir_all(dir.path().join("lib").join("facter")).unwrap();
        assert!(looks_like_module(dir.path()));
    }
}
