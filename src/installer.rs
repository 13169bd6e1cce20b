//! Wires an [`Environment`] to the collaborators the synchronizer needs.

use crate::config::{Environment, ModuleEntry, ProjectConfig};
use crate::error::Result;
use crate::metadata::{
    LegacyFormatEvaluator, MetadataResolver, ModulefileEvaluator, RhaiSpecfile, SpecfileEvaluator,
};
use crate::module::{DependencyDescriptor, Module, ModuleName, Outcome};
use crate::source::Source;
use crate::sync::{ModuleSynchronizer, PathLocks};
use crate::vcs::{GitCli, VersionControl};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

pub struct Installer {
    env: Arc<Environment>,
    vcs: Arc<dyn VersionControl>,
    metadata: Arc<MetadataResolver>,
    specfile: Arc<dyn SpecfileEvaluator>,
    locks: Arc<PathLocks>,
}

impl Installer {
    pub fn new(env: Environment) -> Self {
        let legacy: Option<Arc<dyn LegacyFormatEvaluator>> = if env.legacy_modulefile {
            Some(Arc::new(ModulefileEvaluator))
        } else {
            None
        };
        Self {
            vcs: Arc::new(GitCli::new(env.command_timeout)),
            metadata: Arc::new(MetadataResolver::new(legacy)),
            specfile: Arc::new(RhaiSpecfile),
            locks: Arc::new(PathLocks::new()),
            env: Arc::new(env),
        }
    }

    pub fn with_vcs(mut self, vcs: Arc<dyn VersionControl>) -> Self {
        self.vcs = vcs;
        self
    }

    pub fn with_legacy_evaluator(mut self, legacy: Option<Arc<dyn LegacyFormatEvaluator>>) -> Self {
        self.metadata = Arc::new(MetadataResolver::new(legacy));
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn synchronizer(&self, source: &Source) -> ModuleSynchronizer {
        ModuleSynchronizer::new(
            source.clone(),
            self.env.clone(),
            self.vcs.clone(),
            self.metadata.clone(),
            self.specfile.clone(),
        )
        .with_locks(self.locks.clone())
    }

    /// Builds the module list declared in the project's `[modules]` table.
    pub fn modules_from_config(&self, config: &ProjectConfig) -> Vec<Module> {
        config
            .modules
            .iter()
            .map(|(name, entry)| {
                let (source, version) = match entry {
                    ModuleEntry::Forge(version) => {
                        (Source::forge(&self.env.forge_url), Some(version.clone()))
                    }
                    ModuleEntry::Detailed {
                        git: Some(uri),
                        reference,
                        path,
                        version,
                    } => (
                        Source::git(uri, reference.clone(), path.clone()),
                        version.clone(),
                    ),
                    ModuleEntry::Detailed {
                        git: None,
                        path: Some(path),
                        version,
                        ..
                    } => (Source::local(path), version.clone()),
                    ModuleEntry::Detailed { version, .. } => {
                        (Source::forge(&self.env.forge_url), version.clone())
                    }
                };
                Module::new(name.as_str(), version, source, &self.env)
            })
            .collect()
    }

    pub fn cache(&self, module: &Module) -> Result<()> {
        self.synchronizer(&module.source).cache(&module.name)
    }

    pub fn install(&self, module: &Module) -> Result<Outcome> {
        self.synchronizer(&module.source).install(module)
    }

    /// Installs every module in parallel. A failing module becomes a
    /// [`crate::module::Status::Failed`] outcome and does not stop the others.
    pub fn install_all(&self, modules: &[Module]) -> Vec<(ModuleName, Outcome)> {
        modules
            .par_iter()
            .map(|module| {
                let outcome = self
                    .cache(module)
                    .and_then(|()| self.install(module))
                    .unwrap_or_else(|e| {
                        tracing::error!(module = %module.name, "{}", e);
                        Outcome::failed(e.to_string())
                    });
                (module.name.clone(), outcome)
            })
            .collect()
    }

    pub fn fetch_version(&self, module: &Module) -> Result<String> {
        self.synchronizer(&module.source).fetch_version(&module.name)
    }

    pub fn fetch_dependencies(
        &self,
        module: &Module,
        version: &str,
    ) -> Result<HashSet<DependencyDescriptor>> {
        self.synchronizer(&module.source)
            .fetch_dependencies(&module.name, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modules_from_config() {
        let config: ProjectConfig = toml::from_str(
            r#"
[modules]
"puppetlabs-stdlib" = "4.25.0"
"myorg-app" = { git = "https://example.com/app.git", ref = "main" }
"myorg-site" = { path = "site" }
"#,
        )
        .unwrap();
        let installer = Installer::new(Environment::new("/srv/project"));
        let modules = installer.modules_from_config(&config);
        assert_eq!(modules.len(), 3);

        let app = modules.iter().find(|m| m.name.as_str() == "myorg-app").unwrap();
        assert_eq!(app.source.target_ref(), "main");
        assert!(app.install_path().ends_with("modules/app"));

        let stdlib = modules
            .iter()
            .find(|m| m.name.as_str() == "puppetlabs-stdlib")
            .unwrap();
        assert!(stdlib.source.is_forge());
        assert_eq!(stdlib.version.as_deref(), Some("4.25.0"));

        let site = modules.iter().find(|m| m.name.as_str() == "myorg-site").unwrap();
        assert_eq!(site.source, Source::local("site"));
    }
}
