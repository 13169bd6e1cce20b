use super::Requirement;
use crate::metadata::RawDependency;
use crate::module::{DependencyDescriptor, ModuleName};
use crate::source::Source;

/// Descriptors built from metadata, plus one warning per dropped entry.
#[derive(Debug, Default)]
pub struct Extracted {
    pub dependencies: Vec<DependencyDescriptor>,
    pub warnings: Vec<String>,
}

/// Converts raw metadata dependency entries into descriptors bound to `source`.
///
/// An entry whose requirement cannot be parsed is omitted and reported as a
/// warning; the remaining entries are still returned.
pub fn extract_dependencies(raw: &[RawDependency], source: &Source) -> Extracted {
    let mut out = Extracted::default();

    for entry in raw {
        let name = entry.name.trim();
        if name.is_empty() {
            out.warn("Skipping dependency entry without a name".to_string());
            continue;
        }

        let requirement = match entry.version_requirement.as_deref() {
            None => Requirement::any(),
            Some(text) => match Requirement::parse(text) {
                Ok(req) => req,
                Err(e) => {
                    out.warn(format!("Ignoring dependency {}: {}", name, e));
                    continue;
                }
            },
        };

        out.dependencies.push(DependencyDescriptor {
            name: ModuleName::new(name),
            requirement,
            source: source.clone(),
        });
    }

    out
}

impl Extracted {
    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}
