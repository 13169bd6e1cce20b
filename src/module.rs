//! Core data model: module names, modules, dependency descriptors and install outcomes.

use crate::config::Environment;
use crate::deps::Requirement;
use crate::source::{Source, SourceKind};
use std::fmt;
use std::path::{Path, PathBuf};

/// A module name, optionally qualified by organization as `org/name` or `org-name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleName(String);

impl ModuleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> Option<(&str, &str)> {
        self.0
            .find(['/', '-'])
            .map(|idx| (&self.0[..idx], &self.0[idx + 1..]))
    }

    pub fn has_organization(&self) -> bool {
        self.split().is_some()
    }

    pub fn organization(&self) -> Option<&str> {
        self.split().map(|(org, _)| org)
    }

    /// The unqualified name, used as the install directory name.
    pub fn short_name(&self) -> &str {
        self.split().map(|(_, name)| name).unwrap_or(&self.0)
    }

    /// `org-name` form, safe for use as a single path component.
    pub fn slug(&self) -> String {
        self.0.replace('/', "-")
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A module to be installed from a specific source.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: ModuleName,
    pub version: Option<String>,
    pub source: Source,
    install_path: PathBuf,
}

impl Module {
    pub fn new(
        name: impl Into<ModuleName>,
        version: Option<String>,
        source: Source,
        env: &Environment,
    ) -> Self {
        let name = name.into();
        let install_path = env.install_path(&name);
        Self {
            name,
            version,
            source,
            install_path,
        }
    }

    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }
}

/// A single edge in the dependency graph handed back to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyDescriptor {
    pub name: ModuleName,
    pub requirement: Requirement,
    pub source: Source,
}

impl fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.requirement)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Skipped,
    Failed,
}

/// Result of installing one module. Warnings are also logged via `tracing`.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: Status,
    pub warnings: Vec<String>,
    /// Short revision the working copy was fast-forwarded to, if any.
    pub revision: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            warnings: Vec::new(),
            revision: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_skipped(&self) -> bool {
        self.status == Status::Skipped
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub(crate) fn skip(mut self, message: impl Into<String>) -> Self {
        self.warn(message);
        self.status = Status::Skipped;
        self
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            warnings: vec![message.into()],
            revision: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_qualification() {
        assert!(!ModuleName::new("puppet").has_organization());
        assert!(ModuleName::new("myorg-puppet").has_organization());
        assert!(ModuleName::new("myorg/puppet").has_organization());
    }

    #[test]
    fn test_name_parts() {
        let name = ModuleName::new("puppetlabs/stdlib");
        assert_eq!(name.organization(), Some("puppetlabs"));
        assert_eq!(name.short_name(), "stdlib");
        assert_eq!(name.slug(), "puppetlabs-stdlib");

        let bare = ModuleName::new("ntp");
        assert_eq!(bare.organization(), None);
        assert_eq!(bare.short_name(), "ntp");
    }

    #[test]
    fn test_short_name_keeps_later_dashes() {
        let name = ModuleName::new("example42-php-fpm");
        assert_eq!(name.short_name(), "php-fpm");
    }

    #[test]
    fn test_install_path_derived_from_environment() {
        let env = Environment::new("/srv/project");
        let module = Module::new(
            "myorg-app",
            None,
            Source::local("site/app"),
            &env,
        );
        assert_eq!(module.install_path(), Path::new("/srv/project/modules/app"));
        assert_eq!(module.source_kind(), SourceKind::Local);
    }

    #[test]
    fn test_outcome_skip() {
        let outcome = Outcome::success().skip("dirty");
        assert!(outcome.is_skipped());
        assert_eq!(outcome.warnings, vec!["dirty".to_string()]);
    }
}
