//! # modsync - Module Synchronizer
//!
//! modsync installs configuration-management modules (Puppet-style
//! `org-name` modules) into a project's module directory from three kinds of
//! source: local paths, git repositories and a forge cache.
//!
//! ## Features
//!
//! - **Safe Updates**: a module directory that is already a git working copy is
//!   fast-forwarded from the cache instead of being replaced, and skipped when dirty
//! - **Dependency Discovery**: `metadata.json`, legacy `Modulefile` and Rhai spec files
//! - **Parallel Installs**: independent modules are installed on all CPU cores
//!
//! ## Quick Start
//!
//! ```bash
//! # Install everything declared in modsync.toml
//! modsync install
//!
//! # Show what a module depends on
//! modsync deps myorg-app
//! ```
//!
//! ## Module Organization
//!
//! - [`sync`] - The synchronizer: install, version and dependency queries
//! - [`source`] - Local, git and forge sources and their cache step
//! - [`metadata`] - `metadata.json`, `Modulefile` and spec file parsing
//! - [`deps`] - Version requirements and dependency extraction
//! - [`vcs`] - Version control abstraction and the git implementation
//! - [`installer`] - Wires configuration to the synchronizer

/// Module cache listing and cleanup.
pub mod cache;

/// Configuration file parsing (`modsync.toml`) and the runtime environment.
pub mod config;

/// Version requirements and dependency extraction.
pub mod deps;

/// Error types shared across the crate.
pub mod error;

/// Entry point tying configuration, sources and the synchronizer together.
pub mod installer;

/// Logging setup for the binary.
pub mod logging;

/// Module metadata discovery.
pub mod metadata;

/// Module names, modules and install outcomes.
pub mod module;

/// Module sources and caching.
pub mod source;

/// Module installation.
pub mod sync;

/// Dependency tree visualization.
pub mod tree;

/// Terminal UI utilities (tables, colors).
pub mod ui;

/// Version control operations.
pub mod vcs;

pub use config::Environment;
pub use error::{CommandFailure, Error, Result};
pub use installer::Installer;
pub use module::{DependencyDescriptor, Module, ModuleName, Outcome, Status};
pub use source::{Source, SourceKind};
pub use sync::ModuleSynchronizer;
