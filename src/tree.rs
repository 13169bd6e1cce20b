//! Dependency tree rendering for `modsync deps`.
//!
//! ```text
//! myorg-app v1.2.0
//! ├── puppetlabs-concat (>= 1.0.0, < 3.0.0) [forge]
//! ├── puppetlabs-stdlib (>= 4.13.1) [forge]
//! └── myorg-common (>= 0) [git: https://example.com/common.git@main]
//! ```

use crate::module::{DependencyDescriptor, ModuleName};
use crate::source::Source;
use colored::*;
use std::collections::HashSet;

fn source_label(source: &Source) -> String {
    match source {
        Source::Forge { .. } => "forge".to_string(),
        Source::Local { path } => format!("path: {}", path.display()),
        Source::Git { uri, .. } => format!("git: {}@{}", uri, source.target_ref()),
    }
}

/// Renders `root` and its direct dependencies, sorted by name.
pub fn render_tree(
    root: &ModuleName,
    version: &str,
    dependencies: &HashSet<DependencyDescriptor>,
) -> String {
    let mut out = format!("{} v{}\n", root.as_str().bold().cyan(), version);

    if dependencies.is_empty() {
        out.push_str("└── (no dependencies)\n");
        return out;
    }

    let mut sorted: Vec<&DependencyDescriptor> = dependencies.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    let last = sorted.len() - 1;

    for (i, dep) in sorted.into_iter().enumerate() {
        let prefix = if i == last { "└──" } else { "├──" };
        out.push_str(&format!(
            "{} {} ({}) [{}]\n",
            prefix,
            dep.name.as_str().bold(),
            dep.requirement.to_string().green(),
            source_label(&dep.source).dimmed()
        ));
    }
    out
}

pub fn print_tree(
    root: &ModuleName,
    version: &str,
    dependencies: &HashSet<DependencyDescriptor>,
) {
    print!("{}", render_tree(root, version, dependencies));
}
