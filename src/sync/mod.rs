//! Module installation.
//!
//! [`ModuleSynchronizer`] installs modules belonging to one [`Source`]:
//!
//! - **Git-aware sync** when the install path is already a working copy
//!   (fetch from the cache through a transient remote, fast-forward only)
//! - **Copy-replace** otherwise
//!
//! It also answers version and dependency queries for the resolver.

mod copy;
mod git_sync;
mod locks;

pub use copy::{copy_dir_all, copy_replace};
pub use git_sync::parse_updated_revision;
pub use locks::PathLocks;

use crate::config::Environment;
use crate::deps::extract_dependencies;
use crate::error::{Error, Result};
use crate::metadata::{MetadataResolver, SpecfileEvaluator};
use crate::module::{DependencyDescriptor, Module, ModuleName, Outcome};
use crate::source::Source;
use crate::vcs::VersionControl;
use git_sync::GitSync;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a module's files are right now, and where they go if not the default.
#[derive(Debug)]
struct Located {
    found_path: PathBuf,
    install_override: Option<PathBuf>,
}

pub struct ModuleSynchronizer {
    source: Source,
    env: Arc<Environment>,
    vcs: Arc<dyn VersionControl>,
    metadata: Arc<MetadataResolver>,
    specfile: Arc<dyn SpecfileEvaluator>,
    locks: Arc<PathLocks>,
}

impl ModuleSynchronizer {
    pub fn new(
        source: Source,
        env: Arc<Environment>,
        vcs: Arc<dyn VersionControl>,
        metadata: Arc<MetadataResolver>,
        specfile: Arc<dyn SpecfileEvaluator>,
    ) -> Self {
        Self {
            source,
            env,
            vcs,
            metadata,
            specfile,
            locks: Arc::new(PathLocks::new()),
        }
    }

    /// Shares path locks with other synchronizers working on the same tree.
    pub fn with_locks(mut self, locks: Arc<PathLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Materializes the source locally (clones git sources into the cache).
    /// An existing checkout is refreshed from its remote at most once per lock set.
    pub fn cache(&self, name: &ModuleName) -> Result<()> {
        match self.source.checkout_dir(&self.env) {
            Some(dir) => {
                let lock = self.locks.lock_for(&dir);
                let _guard = lock.lock();
                let refresh = self.locks.first_visit(&dir);
                self.source.cache(&self.env, name, refresh)
            }
            None => self.source.cache(&self.env, name, false),
        }
    }

    pub fn install(&self, module: &Module) -> Result<Outcome> {
        if module.source != self.source {
            return Err(Error::Configuration(format!(
                "{} belongs to {:?}, not to the synchronizer for {:?}",
                module.name, module.source, self.source
            )));
        }
        tracing::debug!(module = %module.name, "Installing {}", module.name);

        let mut outcome = Outcome::success();
        let located = self.locate(&module.name, module.version.as_deref())?;
        let install_path = located
            .install_override
            .unwrap_or_else(|| module.install_path().to_path_buf());

        if !module.name.has_organization() {
            outcome.warn(format!(
                "Invalid module name '{}', you should qualify it with 'ORGANIZATION-{}' for resolution to work correctly",
                module.name, module.name
            ));
        }

        let lock = self.locks.lock_for(&install_path);
        let _guard = lock.lock();

        if self.vcs.is_repository(&install_path) {
            let cache_repo = self
                .source
                .checkout_dir(&self.env)
                .filter(|dir| located.found_path.starts_with(dir))
                .unwrap_or_else(|| located.found_path.clone());
            return GitSync {
                vcs: self.vcs.as_ref(),
                name: &module.name,
                install_path: &install_path,
                cache_repo: &cache_repo,
                reference: self.source.target_ref(),
                destructive: self.env.git_destructive,
            }
            .run(outcome);
        }

        copy_replace(&located.found_path, &install_path, self.env.rsync)?;
        tracing::info!(module = %module.name, "Installed to {}", install_path.display());
        Ok(outcome)
    }

    /// Version declared by the module, defaulting (with a warning) when absent.
    pub fn fetch_version(&self, name: &ModuleName) -> Result<String> {
        self.cache(name)?;
        let located = self.locate(name, None)?;
        let metadata = self.metadata.resolve(&located.found_path)?;
        let (version, warning) = metadata.version_or_default(name.as_str());
        if let Some(message) = warning {
            tracing::warn!("{}", message);
        }
        Ok(version)
    }

    /// Dependencies of `name` at `version`.
    ///
    /// Spec-file dependencies are always included. Metadata dependencies are
    /// parsed either way but only included when forge resolution is enabled,
    /// since without a forge they could never be resolved.
    pub fn fetch_dependencies(
        &self,
        name: &ModuleName,
        version: &str,
    ) -> Result<HashSet<DependencyDescriptor>> {
        self.cache(name)?;
        let located = self.locate(name, Some(version))?;
        let forge = Source::forge(&self.env.forge_url);
        let mut dependencies = HashSet::new();

        let specfile = located.found_path.join(&self.env.specfile_name);
        if specfile.is_file() {
            dependencies.extend(self.specfile.evaluate(&specfile, &forge)?);
        }

        let metadata = self.metadata.resolve(&located.found_path)?;
        let extracted = extract_dependencies(&metadata.dependencies, &forge);
        if self.env.use_forge_resolution {
            dependencies.extend(extracted.dependencies);
        } else if !extracted.dependencies.is_empty() {
            tracing::debug!(
                module = %name,
                "forge resolution disabled, ignoring {} metadata dependencies",
                extracted.dependencies.len()
            );
        }
        Ok(dependencies)
    }

    fn locate(&self, name: &ModuleName, version: Option<&str>) -> Result<Located> {
        if let Some(found_path) = self.source.found_path(&self.env, name, version) {
            return Ok(Located {
                found_path,
                install_override: None,
            });
        }

        if self.source.is_forge() {
            return Err(Error::MissingModule {
                name: name.to_string(),
                path: self.env.cache_root.join("forge").join(name.slug()),
            });
        }

        let Some(root) = self
            .source
            .checkout_dir(&self.env)
            .filter(|dir| dir.is_dir())
        else {
            return Err(Error::CacheMiss {
                name: name.to_string(),
            });
        };

        tracing::debug!(module = %name, "no module layout found, using {}", root.display());
        Ok(Located {
            found_path: root,
            install_override: self
                .source
                .relative_path()
                .map(|rel| self.env.project_path.join(rel)),
        })
    }
}
