use super::{
    DEFAULT_VERSION, LegacyFormatError, LegacyFormatEvaluator, METADATA_JSON, MODULEFILE, Metadata,
    RawDependency,
};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Slot = Arc<Mutex<Option<Arc<Metadata>>>>;

/// Locates and parses module metadata, memoized per module path for the
/// lifetime of the resolver.
///
/// The shared map is only locked to fetch-or-insert a module's slot; parsing
/// happens under that module's own lock, so workers on different modules never
/// wait on each other.
pub struct MetadataResolver {
    legacy: Option<Arc<dyn LegacyFormatEvaluator>>,
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl MetadataResolver {
    /// `legacy` is `None` when no `Modulefile` evaluator is available on this host.
    pub fn new(legacy: Option<Arc<dyn LegacyFormatEvaluator>>) -> Self {
        Self {
            legacy,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, module_path: &Path) -> Result<Arc<Metadata>> {
        let slot = self
            .slots
            .lock()
            .entry(module_path.to_path_buf())
            .or_default()
            .clone();

        let mut guard = slot.lock();
        if let Some(metadata) = guard.as_ref() {
            return Ok(metadata.clone());
        }
        let metadata = Arc::new(self.load(module_path)?);
        *guard = Some(metadata.clone());
        Ok(metadata)
    }

    fn load(&self, module_path: &Path) -> Result<Metadata> {
        let json_path = module_path.join(METADATA_JSON);
        if json_path.is_file() {
            return parse_metadata_json(&json_path);
        }

        let modulefile = module_path.join(MODULEFILE);
        if modulefile.is_file() {
            return Ok(self.evaluate_legacy(&modulefile));
        }

        tracing::debug!(path = %module_path.display(), "no metadata found");
        Ok(Metadata::default())
    }

    fn evaluate_legacy(&self, path: &Path) -> Metadata {
        let mut metadata = Metadata::default();

        let Some(evaluator) = &self.legacy else {
            warn(
                &mut metadata,
                format!(
                    "Cannot read {}: no Modulefile evaluator is available, ignoring its dependencies",
                    path.display()
                ),
            );
            return metadata;
        };

        match evaluator.evaluate(path) {
            Ok(manifest) => {
                metadata.name = manifest.name;
                metadata.version = manifest.version;
                metadata.dependencies = manifest.dependencies;
            }
            Err(e @ (LegacyFormatError::Unavailable(_) | LegacyFormatError::Unsupported(_))) => {
                warn(
                    &mut metadata,
                    format!("Cannot read {}: {}, ignoring its dependencies", path.display(), e),
                );
            }
            Err(LegacyFormatError::Format { message, partial }) => {
                let err = Error::LegacyFormat {
                    path: path.to_path_buf(),
                    message,
                };
                warn(
                    &mut metadata,
                    format!("{}; assuming version {}", err, DEFAULT_VERSION),
                );
                metadata.name = partial.name;
                metadata.version = Some(DEFAULT_VERSION.to_string());
                metadata.dependencies = partial.dependencies;
            }
        }
        metadata
    }
}

fn warn(metadata: &mut Metadata, message: String) {
    tracing::warn!("{}", message);
    metadata.warnings.push(message);
}

fn parse_metadata_json(path: &Path) -> Result<Metadata> {
    let content = fs::read_to_string(path)?;
    let doc: Value = serde_json::from_str(&content).map_err(|source| Error::MetadataParse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut metadata = Metadata {
        name: doc.get("name").and_then(Value::as_str).map(str::to_string),
        version: doc.get("version").and_then(Value::as_str).map(str::to_string),
        ..Metadata::default()
    };

    let entries = doc
        .get("dependencies")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for entry in entries {
        match entry.get("name").and_then(Value::as_str) {
            Some(name) => metadata.dependencies.push(RawDependency {
                name: name.to_string(),
                version_requirement: entry
                    .get("version_requirement")
                    .or_else(|| entry.get("version_range"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            None => warn(
                &mut metadata,
                format!("{}: skipping dependency entry without a name: {}", path.display(), entry),
            ),
        }
    }
    Ok(metadata)
}
