use super::{RemoteBranches, VersionControl, command};
use crate::error::CommandFailure;
use git2::{BranchType, Repository, StatusOptions};
use std::path::Path;
use std::time::Duration;

/// `git` adapter. Queries go through libgit2; anything that mutates the working
/// copy runs the `git` binary under a timeout.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "git".to_string(),
            timeout,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// True when the `git` binary can be executed.
    pub fn is_available(&self) -> bool {
        std::process::Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn git(&self, path: &Path, args: &[&str]) -> Result<String, CommandFailure> {
        command::run(&self.program, args, path, self.timeout)
    }

    fn open(&self, path: &Path) -> Result<Repository, CommandFailure> {
        Repository::open(path).map_err(|e| CommandFailure {
            command: format!("open repository {}", path.display()),
            status: None,
            output: e.message().to_string(),
            timed_out: false,
        })
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl VersionControl for GitCli {
    fn is_repository(&self, path: &Path) -> bool {
        let Ok(repo) = Repository::open(path) else {
            return false;
        };
        // Must be the top of a working copy, not a directory nested inside one.
        match (repo.workdir(), path.canonicalize()) {
            (Some(workdir), Ok(wanted)) => workdir
                .canonicalize()
                .map(|w| w == wanted)
                .unwrap_or(false),
            _ => false,
        }
    }

    fn is_dirty(&self, path: &Path) -> Result<Option<String>, CommandFailure> {
        let repo = self.open(path)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);
        let statuses = repo.statuses(Some(&mut opts)).map_err(|e| CommandFailure {
            command: format!("status {}", path.display()),
            status: None,
            output: e.message().to_string(),
            timed_out: false,
        })?;

        if statuses.is_empty() {
            return Ok(None);
        }
        let changed: Vec<String> = statuses
            .iter()
            .filter_map(|entry| entry.path().map(str::to_string))
            .take(5)
            .collect();
        Ok(Some(format!(
            "{} changed path(s): {}",
            statuses.len(),
            changed.join(", ")
        )))
    }

    fn hard_reset(&self, path: &Path) -> Result<(), CommandFailure> {
        self.git(path, &["reset", "--hard"]).map(|_| ())
    }

    fn clean(&self, path: &Path) -> Result<(), CommandFailure> {
        self.git(path, &["clean", "-fd"]).map(|_| ())
    }

    fn add_remote(&self, path: &Path, name: &str, url: &str) -> Result<(), CommandFailure> {
        self.git(path, &["remote", "add", name, url]).map(|_| ())
    }

    fn remove_remote(&self, path: &Path, name: &str) -> Result<(), CommandFailure> {
        self.git(path, &["remote", "rm", name]).map(|_| ())
    }

    fn fetch(&self, path: &Path, remote: &str, refspecs: &[String]) -> Result<(), CommandFailure> {
        let mut args = vec!["fetch", "--tags", remote];
        args.extend(refspecs.iter().map(String::as_str));
        self.git(path, &args).map(|_| ())
    }

    fn checkout(&self, path: &Path, reference: &str) -> Result<(), CommandFailure> {
        self.git(path, &["checkout", reference]).map(|_| ())
    }

    fn create_branch(
        &self,
        path: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), CommandFailure> {
        self.git(path, &["checkout", "--no-track", "-b", branch, start_point])
            .map(|_| ())
    }

    fn fast_forward_pull(
        &self,
        path: &Path,
        remote: &str,
        reference: &str,
    ) -> Result<String, CommandFailure> {
        self.git(path, &["pull", "--ff-only", remote, reference])
    }

    fn remote_branch_names(&self, path: &Path) -> Result<RemoteBranches, CommandFailure> {
        let repo = self.open(path)?;
        let branches = repo.branches(Some(BranchType::Remote)).map_err(|e| CommandFailure {
            command: format!("branch -r {}", path.display()),
            status: None,
            output: e.message().to_string(),
            timed_out: false,
        })?;

        let mut out = RemoteBranches::new();
        for (branch, _) in branches.flatten() {
            let Ok(Some(full)) = branch.name() else {
                continue;
            };
            if let Some((remote, name)) = full.split_once('/')
                && name != "HEAD"
            {
                out.entry(remote.to_string())
                    .or_default()
                    .insert(name.to_string());
            }
        }
        Ok(out)
    }

    fn default_remote(&self, path: &Path) -> String {
        let remotes = Repository::open(path).ok().and_then(|repo| {
            repo.remotes()
                .ok()
                .map(|names| names.iter().flatten().map(str::to_string).collect::<Vec<_>>())
        });
        match remotes {
            Some(names) if names.iter().any(|n| n == "origin") => "origin".to_string(),
            Some(names) if !names.is_empty() => names[0].clone(),
            _ => "origin".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        fs::write(dir.join("README"), "hello\n").unwrap();
        {
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("README")).unwrap();
            index.write().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = git2::Signature::now("Test", "test@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_is_repository_only_at_workdir_root() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::default();
        assert!(!git.is_repository(dir.path()));

        init_repo(dir.path());
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        assert!(git.is_repository(dir.path()));
        assert!(!git.is_repository(&dir.path().join("nested")));
    }

    #[test]
    fn test_is_dirty_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let git = GitCli::default();
        assert_eq!(git.is_dirty(dir.path()).unwrap(), None);

        fs::write(dir.path().join("README"), "changed\n").unwrap();
        let dirty = git.is_dirty(dir.path()).unwrap().unwrap();
        assert!(dirty.contains("README"));
    }

    #[test]
    fn test_default_remote_falls_back_to_origin() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let git = GitCli::default();
        assert_eq!(git.default_remote(dir.path()), "origin");

        repo.remote("upstream", "https://example.com/x.git").unwrap();
        assert_eq!(git.default_remote(dir.path()), "upstream");
    }

    #[test]
    fn test_remote_branch_names_empty_without_remotes() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let git = GitCli::default();
        assert!(git.remote_branch_names(dir.path()).unwrap().is_empty());
    }
}
