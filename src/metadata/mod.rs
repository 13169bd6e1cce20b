//! Module metadata discovery.
//!
//! A module describes its version and dependencies in one of:
//!
//! 1. `metadata.json` (authoritative; malformed content is a hard error)
//! 2. `Modulefile` (legacy DSL; problems degrade to warnings and defaults)
//!
//! Separately, a module may ship a spec file (`Modulesfile` by default): a Rhai
//! script declaring extra dependencies, evaluated by [`SpecfileEvaluator`].

mod modulefile;
mod resolver;
mod specfile;

pub use modulefile::{
    LegacyFormatError, LegacyFormatEvaluator, LegacyManifest, ModulefileEvaluator, parse_modulefile,
};
pub use resolver::MetadataResolver;
pub use specfile::{RhaiSpecfile, SpecfileEvaluator};

pub const METADATA_JSON: &str = "metadata.json";
pub const MODULEFILE: &str = "Modulefile";

/// Version used when a module does not declare one.
pub const DEFAULT_VERSION: &str = "0.0.1";

/// A dependency entry as written in metadata, before requirement parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDependency {
    pub name: String,
    pub version_requirement: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub name: Option<String>,
    /// Absent until the default-version rule is applied by the caller.
    pub version: Option<String>,
    /// Always present; empty when the module declares nothing.
    pub dependencies: Vec<RawDependency>,
    /// Warnings recorded while resolving this metadata.
    pub warnings: Vec<String>,
}

impl Metadata {
    /// The declared version, or [`DEFAULT_VERSION`] together with a warning.
    pub fn version_or_default(&self, module: &str) -> (String, Option<String>) {
        match &self.version {
            Some(v) => (v.clone(), None),
            None => (
                DEFAULT_VERSION.to_string(),
                Some(format!(
                    "Module {} does not declare a version, using {}",
                    module, DEFAULT_VERSION
                )),
            ),
        }
    }
}
