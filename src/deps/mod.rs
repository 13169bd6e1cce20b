//! Dependency extraction.
//!
//! - **Requirements**: parse loose constraint strings into `semver` requirements
//! - **Extraction**: turn raw metadata entries into [`crate::module::DependencyDescriptor`]s

mod extract;
mod requirement;

pub use extract::{Extracted, extract_dependencies};
pub use requirement::Requirement;
