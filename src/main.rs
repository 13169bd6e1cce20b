//! # modsync CLI Entry Point
//!
//! Parses arguments with clap, loads `modsync.toml` and routes commands:
//!
//! - **Install**: `install [names..]`
//! - **Queries**: `version <name>`, `deps <name>`
//! - **Cache**: `cache path|ls|clean|prune`
//! - **Shell**: `completions <shell>`

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::{Path, PathBuf};

use modsync::cache;
use modsync::config::{Environment, ProjectConfig};
use modsync::logging;
use modsync::tree;
use modsync::ui;
use modsync::{Installer, Module};

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
    fn SetConsoleCP(wCodePageID: u32) -> i32;
}

#[cfg(windows)]
fn enable_windows_utf8_console() {
    unsafe {
        SetConsoleOutputCP(65001);
        SetConsoleCP(65001);
    }
}

#[cfg(not(windows))]
fn enable_windows_utf8_console() {}

#[derive(Parser)]
#[command(name = "modsync")]
#[command(about = "Synchronize configuration modules into a project", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory containing modsync.toml
    #[arg(long, short = 'C', global = true, default_value = ".")]
    project: PathBuf,
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install modules declared in modsync.toml (all of them when no name is given)
    Install {
        names: Vec<String>,
        /// Reset and clean working copies before syncing (discards local changes)
        #[arg(long)]
        destructive: bool,
        /// Copy over existing install directories instead of replacing them
        #[arg(long)]
        rsync: bool,
    },
    /// Print the version a module declares
    Version { name: String },
    /// Show a module's dependencies
    Deps {
        name: String,
        /// Version to inspect (defaults to the declared one)
        #[arg(long, value_name = "VERSION")]
        at: Option<String>,
        /// Ignore metadata dependencies, as when no forge is available
        #[arg(long)]
        no_forge: bool,
    },
    /// Manage the module cache
    Cache {
        #[command(subcommand)]
        op: CacheOp,
    },
    /// Generate shell completion scripts
    Completions { shell: Shell },
}

#[derive(Subcommand)]
enum CacheOp {
    /// Print cache directory path
    Path,
    /// List cached items
    #[command(alias = "list")]
    Ls,
    /// Clean the cache
    Clean,
    /// Remove git checkouts no configured module uses
    Prune,
}

struct Project {
    config: ProjectConfig,
    installer: Installer,
}

fn load_project(project_dir: &Path, verbose: bool) -> Result<Project> {
    let project_dir = project_dir
        .canonicalize()
        .with_context(|| format!("Project directory {} not found", project_dir.display()))?;
    let config = ProjectConfig::load(&project_dir)?;
    let mut env = Environment::from_settings(&project_dir, &config.settings)?;
    env.verbose |= verbose;
    logging::init_logging(env.verbose);
    Ok(Project {
        config,
        installer: Installer::new(env),
    })
}

fn find_module(project: &Project, name: &str) -> Result<Module> {
    project
        .installer
        .modules_from_config(&project.config)
        .into_iter()
        .find(|m| m.name.as_str() == name)
        .with_context(|| format!("Module '{}' is not declared in modsync.toml", name))
}

fn install(project: Project, names: &[String]) -> Result<()> {
    let mut modules = project.installer.modules_from_config(&project.config);
    if !names.is_empty() {
        for name in names {
            if !modules.iter().any(|m| m.name.as_str() == name) {
                bail!("Module '{}' is not declared in modsync.toml", name);
            }
        }
        modules.retain(|m| names.iter().any(|n| n == m.name.as_str()));
    }
    if modules.is_empty() {
        println!("{} No modules to install.", "ℹ".blue());
        return Ok(());
    }

    println!(
        "{} Installing {} module(s) into {}",
        "→".cyan(),
        modules.len(),
        project.installer.environment().install_root.display()
    );
    let outcomes = project.installer.install_all(&modules);
    let failed = ui::print_outcomes(&outcomes);
    if failed > 0 {
        bail!("{} module(s) failed to install", failed);
    }
    Ok(())
}

fn deps(project: &Project, name: &str, version: Option<&str>) -> Result<()> {
    let module = find_module(project, name)?;
    let version = match version {
        Some(v) => v.to_string(),
        None => project.installer.fetch_version(&module)?,
    };
    let dependencies = project.installer.fetch_dependencies(&module, &version)?;
    tree::print_tree(&module.name, &version, &dependencies);
    Ok(())
}

fn main() -> Result<()> {
    enable_windows_utf8_console();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Install {
            names,
            destructive,
            rsync,
        } => {
            let mut project = load_project(&cli.project, cli.verbose)?;
            if *destructive || *rsync {
                let mut env = project.installer.environment().clone();
                env.git_destructive |= *destructive;
                env.rsync |= *rsync;
                project.installer = Installer::new(env);
            }
            install(project, names)
        }
        Commands::Version { name } => {
            let project = load_project(&cli.project, cli.verbose)?;
            let module = find_module(&project, name)?;
            println!("{}", project.installer.fetch_version(&module)?);
            Ok(())
        }
        Commands::Deps { name, at, no_forge } => {
            let mut project = load_project(&cli.project, cli.verbose)?;
            if *no_forge {
                let mut env = project.installer.environment().clone();
                env.use_forge_resolution = false;
                project.installer = Installer::new(env);
            }
            deps(&project, name, at.as_deref())
        }
        Commands::Cache { op } => {
            let project = load_project(&cli.project, cli.verbose)?;
            let env = project.installer.environment();
            match op {
                CacheOp::Path => cache::print_path(env),
                CacheOp::Ls => cache::list(env),
                CacheOp::Clean => cache::clean(env),
                CacheOp::Prune => {
                    let sources: Vec<_> = project
                        .installer
                        .modules_from_config(&project.config)
                        .into_iter()
                        .map(|m| m.source)
                        .collect();
                    let removed = cache::prune_unused(env, &sources)?;
                    println!("{} Removed {} unused checkout(s).", "✓".green(), removed);
                    Ok(())
                }
            }
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_install_names() {
        let cli = Cli::try_parse_from(["modsync", "install", "myorg-app", "--destructive"]).unwrap();
        match cli.command {
            Commands::Install {
                names, destructive, ..
            } => {
                assert_eq!(names, vec!["myorg-app".to_string()]);
                assert!(destructive);
            }
            _ => panic!("Expected Install"),
        }
    }

    #[test]
    fn test_cache_list_alias() {
        let cli = Cli::try_parse_from(["modsync", "cache", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::Cache { op: CacheOp::Ls }));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
