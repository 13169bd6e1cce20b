//! Module cache management.
//!
//! The cache root (default `~/.modsync/cache`) holds:
//!
//! - `git/<hash>` - one clone per git source url
//! - `forge/<org-name>/<version>` - unpacked forge releases
//!
//! ## Commands
//!
//! - `modsync cache path` - Print cache directory location
//! - `modsync cache list` - List cached checkouts and releases
//! - `modsync cache clean` - Clear the whole cache
//! - `modsync cache prune` - Remove git checkouts no module refers to

use crate::config::Environment;
use crate::source::Source;
use crate::ui;
use anyhow::Result;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub kind: &'static str,
    pub name: String,
    pub detail: String,
    pub path: PathBuf,
}

pub fn print_path(env: &Environment) -> Result<()> {
    println!("{}", env.cache_root.display());
    Ok(())
}

pub fn entries(cache_root: &Path) -> Result<Vec<CacheEntry>> {
    let mut out = Vec::new();

    let git_dir = cache_root.join("git");
    if git_dir.is_dir() {
        for entry in fs::read_dir(&git_dir)?.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let origin = git2::Repository::open(&path)
                .ok()
                .and_then(|repo| {
                    repo.find_remote("origin")
                        .ok()
                        .and_then(|r| r.url().map(str::to_string))
                })
                .unwrap_or_else(|| "(no origin)".to_string());
            out.push(CacheEntry {
                kind: "git",
                name: entry.file_name().to_string_lossy().to_string(),
                detail: origin,
                path,
            });
        }
    }

    let forge_dir = cache_root.join("forge");
    if forge_dir.is_dir() {
        for module in fs::read_dir(&forge_dir)?.flatten() {
            if !module.path().is_dir() {
                continue;
            }
            for release in fs::read_dir(module.path())?.flatten() {
                if release.path().is_dir() {
                    out.push(CacheEntry {
                        kind: "forge",
                        name: module.file_name().to_string_lossy().to_string(),
                        detail: release.file_name().to_string_lossy().to_string(),
                        path: release.path(),
                    });
                }
            }
        }
    }

    out.sort_by(|a, b| (a.kind, &a.name, &a.detail).cmp(&(b.kind, &b.name, &b.detail)));
    Ok(out)
}

pub fn list(env: &Environment) -> Result<()> {
    if !env.cache_root.exists() {
        println!("{} Cache is empty.", "ℹ".blue());
        return Ok(());
    }

    let cached = entries(&env.cache_root)?;
    if cached.is_empty() {
        println!("{} (empty)", "ℹ".blue());
        return Ok(());
    }

    let mut table = ui::Table::new(&["Kind", "Entry", "Origin / Version"]);
    for entry in cached {
        table.add_row(vec![entry.kind.to_string(), entry.name, entry.detail]);
    }
    table.print();
    Ok(())
}

pub fn clean(env: &Environment) -> Result<()> {
    let cache_dir = &env.cache_root;
    if cache_dir.exists() {
        println!("{} Cleaning cache...", "🧹".yellow());
        fs::remove_dir_all(cache_dir)?;
        fs::create_dir_all(cache_dir)?;
        println!("{} Cache cleaned.", "✓".green());
    } else {
        println!("{} Cache already empty.", "✓".green());
    }
    Ok(())
}

/// Removes git checkouts not backing any of `sources`. Returns how many were removed.
pub fn prune_unused(env: &Environment, sources: &[Source]) -> Result<usize> {
    let keep: Vec<PathBuf> = sources
        .iter()
        .filter_map(|s| s.checkout_dir(env))
        .collect();

    let mut removed = 0;
    for entry in entries(&env.cache_root)? {
        if entry.kind != "git" || keep.contains(&entry.path) {
            continue;
        }
        println!("   {} Removing unused: {}", "🗑️".red(), entry.detail);
        match fs::remove_dir_all(&entry.path) {
            Ok(()) => removed += 1,
            Err(e) => println!("     Error removing {}: {}", entry.path.display(), e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_lists_git_and_forge() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("git").join("0123456789abcdef")).unwrap();
        fs::create_dir_all(root.join("forge").join("puppetlabs-stdlib").join("4.25.0")).unwrap();

        let found = entries(root).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, "forge");
        assert_eq!(found[0].detail, "4.25.0");
        assert_eq!(found[1].kind, "git");
        assert_eq!(found[1].detail, "(no origin)");
    }

    #[test]
    fn test_prune_keeps_referenced_checkouts() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = Environment::new(dir.path());
        env.cache_root = dir.path().join("cache");

        let kept = Source::git("https://example.com/kept.git", None, None);
        let kept_dir = kept.checkout_dir(&env).unwrap();
        fs::create_dir_all(&kept_dir).unwrap();
        let stale = env.cache_root.join("git").join("ffffffffffffffff");
        fs::create_dir_all(&stale).unwrap();

        let removed = prune_unused(&env, &[kept]).unwrap();
        assert_eq!(removed, 1);
        assert!(kept_dir.exists());
        assert!(!stale.exists());
    }

    #[test]
    fn test_entries_of_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(entries(&dir.path().join("nope")).unwrap().is_empty());
    }
}
