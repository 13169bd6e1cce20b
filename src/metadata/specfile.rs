//! Spec-file evaluation.
//!
//! A spec file is a Rhai script declaring dependencies:
//!
//! ```text
//! forge("https://forgeapi.puppet.com");
//! dependency("puppetlabs/stdlib", ">= 4.0.0 < 5.0.0");
//! dependency("puppetlabs/concat");
//! git_dependency("myorg/app", "https://example.com/app.git", "main");
//! local_dependency("myorg/site", "../site");
//! ```

use crate::deps::Requirement;
use crate::error::{Error, Result};
use crate::module::{DependencyDescriptor, ModuleName};
use crate::source::Source;
use rhai::{Engine, EvalAltResult};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const MAX_OPERATIONS: u64 = 100_000;

/// Evaluates a spec file into dependency descriptors.
///
/// `default_source` is used for dependencies that do not name their own source.
pub trait SpecfileEvaluator: Send + Sync {
    fn evaluate(&self, path: &Path, default_source: &Source) -> Result<Vec<DependencyDescriptor>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RhaiSpecfile;

struct State {
    forge: Source,
    base_dir: PathBuf,
    dependencies: Vec<DependencyDescriptor>,
}

type Shared = Rc<RefCell<State>>;

impl SpecfileEvaluator for RhaiSpecfile {
    fn evaluate(&self, path: &Path, default_source: &Source) -> Result<Vec<DependencyDescriptor>> {
        let state: Shared = Rc::new(RefCell::new(State {
            forge: default_source.clone(),
            base_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            dependencies: Vec::new(),
        }));

        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        register_dsl(&mut engine, &state);

        engine
            .run_file(path.to_path_buf())
            .map_err(|e| Error::Specfile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        drop(engine);
        let dependencies = std::mem::take(&mut state.borrow_mut().dependencies);
        tracing::debug!(
            specfile = %path.display(),
            "declared {} dependencies",
            dependencies.len()
        );
        Ok(dependencies)
    }
}

fn register_dsl(engine: &mut Engine, state: &Shared) {
    let s = state.clone();
    engine.register_fn("forge", move |url: &str| {
        s.borrow_mut().forge = Source::forge(url);
    });

    let s = state.clone();
    engine.register_fn("dependency", move |name: &str| {
        let source = s.borrow().forge.clone();
        push(&s, name, Requirement::any(), source);
    });

    let s = state.clone();
    engine.register_fn(
        "dependency",
        move |name: &str, requirement: &str| -> std::result::Result<(), Box<EvalAltResult>> {
            let requirement = Requirement::parse(requirement).map_err(|e| e.to_string())?;
            let source = s.borrow().forge.clone();
            push(&s, name, requirement, source);
            Ok(())
        },
    );

    let s = state.clone();
    engine.register_fn("git_dependency", move |name: &str, uri: &str| {
        push(&s, name, Requirement::any(), Source::git(uri, None, None));
    });

    let s = state.clone();
    engine.register_fn("git_dependency", move |name: &str, uri: &str, reference: &str| {
        let source = Source::git(uri, Some(reference.to_string()), None);
        push(&s, name, Requirement::any(), source);
    });

    let s = state.clone();
    engine.register_fn("local_dependency", move |name: &str, path: &str| {
        let dir = s.borrow().base_dir.join(path);
        push(&s, name, Requirement::any(), Source::local(dir));
    });
}

fn push(state: &Shared, name: &str, requirement: Requirement, source: Source) {
    state.borrow_mut().dependencies.push(DependencyDescriptor {
        name: ModuleName::new(name),
        requirement,
        source,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_spec(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("Modulesfile");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_forge_and_git_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_spec(
            dir.path(),
            r#"
forge("https://forge.example.com");
dependency("puppetlabs/stdlib", ">= 4.0.0 < 5.0.0");
dependency("puppetlabs/concat");
git_dependency("myorg/app", "https://example.com/app.git", "main");
"#,
        );

        let default = Source::forge("https://forgeapi.puppet.com");
        let deps = RhaiSpecfile.evaluate(&path, &default).unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].source, Source::forge("https://forge.example.com"));
        assert!(deps[1].requirement.is_any());
        assert_eq!(
            deps[2].source,
            Source::git("https://example.com/app.git", Some("main".to_string()), None)
        );
    }

    #[test]
    fn test_default_source_used_without_forge_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_spec(dir.path(), r#"dependency("puppetlabs/ntp");"#);
        let default = Source::forge("https://forgeapi.puppet.com");
        let deps = RhaiSpecfile.evaluate(&path, &default).unwrap();
        assert_eq!(deps[0].source, default);
    }

    #[test]
    fn test_local_dependency_relative_to_specfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_spec(dir.path(), r#"local_dependency("myorg/site", "site");"#);
        let deps = RhaiSpecfile
            .evaluate(&path, &Source::forge("https://forgeapi.puppet.com"))
            .unwrap();
        assert_eq!(deps[0].source, Source::local(dir.path().join("site")));
    }

    #[test]
    fn test_bad_requirement_fails_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_spec(dir.path(), r#"dependency("a/b", "not a version");"#);
        let err = RhaiSpecfile
            .evaluate(&path, &Source::forge("https://forgeapi.puppet.com"))
            .unwrap_err();
        assert!(matches!(err, Error::Specfile { .. }));
    }

    #[test]
    fn test_runaway_script_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_spec(dir.path(), "loop { }");
        assert!(
            RhaiSpecfile
                .evaluate(&path, &Source::forge("https://forgeapi.puppet.com"))
                .is_err()
        );
    }
}
