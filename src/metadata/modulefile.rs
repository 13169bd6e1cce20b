//! Legacy `Modulefile` evaluation.
//!
//! ```text
//! name    'puppetlabs-apache'
//! version '1.4.0'
//! dependency 'puppetlabs/stdlib', '>= 2.4.0'
//! dependency 'puppetlabs/concat', '>= 1.1.1 < 2.0.0'
//! ```

use super::RawDependency;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\(?\s*(.*?)\s*\)?$").expect("valid directive regex")
});

static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)""#).expect("valid quoted regex")
});

/// Directives that carry descriptive data only.
const DESCRIPTIVE: &[&str] = &[
    "author",
    "license",
    "summary",
    "description",
    "project_page",
    "source",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub dependencies: Vec<RawDependency>,
}

#[derive(Debug, Error)]
pub enum LegacyFormatError {
    /// The evaluator cannot run on this host.
    #[error("legacy manifest evaluator unavailable: {0}")]
    Unavailable(String),

    /// The evaluator runs but no longer understands the legacy format.
    #[error("legacy manifest format no longer supported: {0}")]
    Unsupported(String),

    /// The manifest is malformed. `partial` holds everything read before the problem.
    #[error("{message}")]
    Format {
        message: String,
        partial: LegacyManifest,
    },
}

/// Evaluates a legacy manifest into typed fields.
pub trait LegacyFormatEvaluator: Send + Sync {
    fn evaluate(&self, path: &Path) -> Result<LegacyManifest, LegacyFormatError>;
}

/// Built-in line-oriented `Modulefile` reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModulefileEvaluator;

impl LegacyFormatEvaluator for ModulefileEvaluator {
    fn evaluate(&self, path: &Path) -> Result<LegacyManifest, LegacyFormatError> {
        let content = fs::read_to_string(path).map_err(|e| {
            LegacyFormatError::Unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        parse_modulefile(&content)
    }
}

pub fn parse_modulefile(content: &str) -> Result<LegacyManifest, LegacyFormatError> {
    let mut manifest = LegacyManifest::default();

    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = idx + 1;

        let Some(caps) = DIRECTIVE.captures(line) else {
            return Err(format_error(manifest, format!("line {}: cannot parse '{}'", line_no, line)));
        };
        let keyword = caps[1].to_string();
        let args: Vec<String> = QUOTED
            .captures_iter(&caps[2])
            .map(|c| {
                c.get(1)
                    .or_else(|| c.get(2))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            })
            .collect();

        match keyword.as_str() {
            "name" | "version" => {
                let [value] = args.as_slice() else {
                    return Err(format_error(
                        manifest,
                        format!("line {}: '{}' takes exactly one string", line_no, keyword),
                    ));
                };
                if keyword == "name" {
                    manifest.name = Some(value.clone());
                } else {
                    manifest.version = Some(value.clone());
                }
            }
            "dependency" => match args.as_slice() {
                [name] => manifest.dependencies.push(RawDependency {
                    name: name.clone(),
                    version_requirement: None,
                }),
                [name, requirement] | [name, requirement, _] => {
                    manifest.dependencies.push(RawDependency {
                        name: name.clone(),
                        version_requirement: Some(requirement.clone()),
                    })
                }
                _ => {
                    return Err(format_error(
                        manifest,
                        format!("line {}: 'dependency' takes one to three strings", line_no),
                    ));
                }
            },
            kw if DESCRIPTIVE.contains(&kw) => {}
            other => {
                return Err(format_error(
                    manifest,
                    format!("line {}: unknown directive '{}'", line_no, other),
                ));
            }
        }
    }

    if manifest.version.is_none() {
        return Err(format_error(manifest, "missing 'version'".to_string()));
    }
    Ok(manifest)
}

fn format_error(partial: LegacyManifest, message: String) -> LegacyFormatError {
    LegacyFormatError::Format { message, partial }
}
