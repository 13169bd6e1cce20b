//! End-to-end install against the real `git` binary.
//!
//! The upstream repository is a local directory, so no network is needed.
//! Tests are skipped when `git` is not installed.

use git2::{Repository, Signature};
use modsync::config::Environment;
use modsync::vcs::{GitCli, VersionControl};
use modsync::{Installer, Module, Source, Status};
use std::fs;
use std::path::Path;

fn git_available() -> bool {
    if GitCli::default().is_available() {
        return true;
    }
    eprintln!("Skipping test: git not found");
    false
}

/// Commits the whole working directory onto `branch` and points HEAD at it.
/// A new branch starts from the current HEAD.
fn commit_all(repo: &Repository, branch: &str, message: &str) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    let refname = format!("refs/heads/{}", branch);
    let parent = repo
        .find_reference(&refname)
        .or_else(|_| repo.head())
        .ok()
        .and_then(|r| r.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some(&refname), &sig, &sig, message, &tree, &parents)
        .unwrap();
    repo.set_head(&refname).unwrap();
}

fn read_manifest(install_path: &Path) -> String {
    fs::read_to_string(install_path.join("manifests").join("init.pp")).unwrap()
}

fn assert_no_transient_remote(install_path: &Path) {
    let installed = Repository::open(install_path).unwrap();
    let remotes = installed.remotes().unwrap();
    assert!(
        remotes.iter().flatten().all(|r| !r.starts_with("modsync-")),
        "transient remote left behind"
    );
}

fn write_manifest(dir: &Path, body: &str) {
    fs::create_dir_all(dir.join("manifests")).unwrap();
    fs::write(dir.join("manifests").join("init.pp"), body).unwrap();
}

fn upstream(dir: &Path) -> Repository {
    let repo = Repository::init(dir).unwrap();
    fs::write(
        dir.join("metadata.json"),
        r#"{"name": "myorg-ntp", "version": "1.0.0"}"#,
    )
    .unwrap();
    write_manifest(dir, "class ntp {}\n");
    commit_all(&repo, "main", "initial");
    repo
}

struct Setup {
    upstream_dir: tempfile::TempDir,
    _project_dir: tempfile::TempDir,
    upstream: Repository,
    installer: Installer,
    module: Module,
}

fn setup() -> Setup {
    let upstream_dir = tempfile::tempdir().unwrap();
    let project_dir = tempfile::tempdir().unwrap();
    let upstream = upstream(upstream_dir.path());

    let env = Environment::new(project_dir.path());
    let source = Source::git(
        upstream_dir.path().to_string_lossy(),
        Some("main".to_string()),
        None,
    );
    let module = Module::new("myorg-ntp", None, source, &env);
    Setup {
        upstream_dir,
        _project_dir: project_dir,
        upstream,
        installer: Installer::new(env),
        module,
    }
}

impl Setup {
    /// A second run of the tool: same environment, fresh per-process state.
    fn next_run(&self) -> Installer {
        Installer::new(self.installer.environment().clone())
    }

    fn commit_upstream(&self, branch: &str, manifest: &str, message: &str) {
        write_manifest(self.upstream_dir.path(), manifest);
        commit_all(&self.upstream, branch, message);
    }
}

#[test]
fn test_fresh_install_then_fast_forward() {
    if !git_available() {
        return;
    }
    let s = setup();
    let install_path = s.module.install_path().to_path_buf();

    let outcomes = s.installer.install_all(std::slice::from_ref(&s.module));
    assert_eq!(outcomes[0].1.status, Status::Success, "{:?}", outcomes[0].1);
    assert_eq!(read_manifest(&install_path), "class ntp {}\n");
    assert!(GitCli::default().is_repository(&install_path));

    s.commit_upstream("main", "class ntp { package { 'ntp': } }\n", "install package");

    let installer = s.next_run();
    installer.cache(&s.module).unwrap();
    let outcome = installer.install(&s.module).unwrap();
    assert!(outcome.is_success(), "{:?}", outcome);
    assert!(outcome.revision.is_some());
    assert_eq!(read_manifest(&install_path), "class ntp { package { 'ntp': } }\n");
    assert_no_transient_remote(&install_path);
}

#[test]
fn test_cache_is_refreshed_once_per_run() {
    if !git_available() {
        return;
    }
    let s = setup();
    let install_path = s.module.install_path().to_path_buf();
    s.installer.install_all(std::slice::from_ref(&s.module));

    s.commit_upstream("main", "class ntp { service { 'ntp': } }\n", "add service");

    let outcomes = s.installer.install_all(std::slice::from_ref(&s.module));
    assert_eq!(outcomes[0].1.status, Status::Success, "{:?}", outcomes[0].1);
    assert_eq!(outcomes[0].1.revision, None);
    assert_eq!(read_manifest(&install_path), "class ntp {}\n");

    let outcomes = s.next_run().install_all(std::slice::from_ref(&s.module));
    assert_eq!(outcomes[0].1.status, Status::Success, "{:?}", outcomes[0].1);
    assert!(outcomes[0].1.revision.is_some());
    assert_eq!(read_manifest(&install_path), "class ntp { service { 'ntp': } }\n");
}

#[test]
fn test_branch_created_upstream_after_first_install() {
    if !git_available() {
        return;
    }
    let s = setup();
    let install_path = s.module.install_path().to_path_buf();
    let outcomes = s.installer.install_all(std::slice::from_ref(&s.module));
    assert_eq!(outcomes[0].1.status, Status::Success, "{:?}", outcomes[0].1);

    s.commit_upstream("develop", "class ntp { file { '/etc/ntp.conf': } }\n", "develop work");

    let installer = s.next_run();
    let develop = Module::new(
        "myorg-ntp",
        None,
        Source::git(
            s.upstream_dir.path().to_string_lossy(),
            Some("develop".to_string()),
            None,
        ),
        installer.environment(),
    );
    assert_eq!(develop.install_path(), install_path.as_path());

    let outcomes = installer.install_all(std::slice::from_ref(&develop));
    assert_eq!(outcomes[0].1.status, Status::Success, "{:?}", outcomes[0].1);
    assert_eq!(read_manifest(&install_path), "class ntp { file { '/etc/ntp.conf': } }\n");

    let installed = Repository::open(&install_path).unwrap();
    assert_eq!(installed.head().unwrap().shorthand(), Some("develop"));
    assert_no_transient_remote(&install_path);
}

#[test]
fn test_local_edits_are_preserved() {
    if !git_available() {
        return;
    }
    let s = setup();
    let install_path = s.module.install_path().to_path_buf();
    s.installer.cache(&s.module).unwrap();
    s.installer.install(&s.module).unwrap();

    fs::write(install_path.join("manifests").join("init.pp"), "# local\n").unwrap();
    let outcome = s.installer.install(&s.module).unwrap();
    assert!(outcome.is_skipped());
    assert_eq!(read_manifest(&install_path), "# local\n");
}

#[test]
fn test_reinstall_without_changes_is_idempotent() {
    if !git_available() {
        return;
    }
    let s = setup();
    let install_path = s.module.install_path().to_path_buf();
    s.installer.cache(&s.module).unwrap();
    s.installer.install(&s.module).unwrap();

    let head = |path: &Path| {
        Repository::open(path)
            .unwrap()
            .head()
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id()
    };
    let before = (head(&install_path), read_manifest(&install_path));

    for _ in 0..2 {
        let outcome = s.installer.install(&s.module).unwrap();
        assert!(outcome.is_success(), "{:?}", outcome);
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
        assert_eq!(outcome.revision, None);
        assert_eq!((head(&install_path), read_manifest(&install_path)), before);
        assert_no_transient_remote(&install_path);
    }
    assert_eq!(GitCli::default().is_dirty(&install_path).unwrap(), None);
}

#[test]
fn test_version_read_from_cached_checkout() {
    if !git_available() {
        return;
    }
    let s = setup();
    assert_eq!(s.installer.fetch_version(&s.module).unwrap(), "1.0.0");
}
