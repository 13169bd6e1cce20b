//! Loose version constraints as written in module metadata.
//!
//! Accepted forms (space- or comma-separated comparators):
//!
//! ```text
//! >= 1.0.0 < 2.0.0     1.x     1.2.x     1.2.3 (exact)
//! ~> 1.2               1.0.0 - 2.0.0      * / empty (any)
//! ```

use crate::error::{Error, Result};
use regex::Regex;
use semver::{Version, VersionReq};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*v?([0-9][0-9A-Za-z.*+\-]*)\s+-\s+v?([0-9][0-9A-Za-z.*+\-]*)\s*$")
        .expect("valid range regex")
});

static COMPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(>=|<=|~>|>|<|=|~|\^)?\s*v?([0-9xX*][0-9A-Za-z.*+\-]*)")
        .expect("valid comparator regex")
});

#[derive(Debug, Clone)]
pub struct Requirement {
    raw: String,
    req: VersionReq,
}

impl Requirement {
    pub fn any() -> Self {
        Self {
            raw: String::new(),
            req: VersionReq::STAR,
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let normalized = normalize(input).map_err(|message| Error::Requirement {
            input: input.to_string(),
            message,
        })?;
        let req = VersionReq::parse(&normalized).map_err(|e| Error::Requirement {
            input: input.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            raw: input.trim().to_string(),
            req,
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version)
    }

    pub fn version_req(&self) -> &VersionReq {
        &self.req
    }

    pub fn is_any(&self) -> bool {
        self.req == VersionReq::STAR
    }
}

impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        self.req == other.req
    }
}

impl Eq for Requirement {}

impl Hash for Requirement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.req.to_string().hash(state);
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            f.write_str(">= 0")
        } else {
            f.write_str(&self.raw)
        }
    }
}

fn normalize(input: &str) -> std::result::Result<String, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "*" || trimmed == "x" {
        return Ok("*".to_string());
    }

    if let Some(caps) = RANGE.captures(trimmed) {
        return Ok(format!(">={}, <={}", strip_wildcards(&caps[1]), strip_wildcards(&caps[2])));
    }

    let cleaned = trimmed.replace(',', " ");
    let mut comparators = Vec::new();
    let mut consumed = 0;
    for caps in COMPARATOR.captures_iter(&cleaned) {
        let whole = caps.get(0).ok_or("empty match")?;
        if !cleaned[consumed..whole.start()].trim().is_empty() {
            return Err(format!(
                "unexpected '{}'",
                cleaned[consumed..whole.start()].trim()
            ));
        }
        consumed = whole.end();

        let op = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let version = caps[2].replace(['x', 'X'], "*");
        comparators.extend(translate(op, &version)?);
    }
    if !cleaned[consumed..].trim().is_empty() {
        return Err(format!("unexpected '{}'", cleaned[consumed..].trim()));
    }
    if comparators.is_empty() {
        return Err("no version comparators".to_string());
    }
    Ok(comparators.join(", "))
}

fn translate(op: &str, version: &str) -> std::result::Result<Vec<String>, String> {
    let parts: Vec<&str> = version.split('.').collect();
    match op {
        "" if version.contains('*') => Ok(vec![version.to_string()]),
        "" if parts.len() >= 3 => Ok(vec![format!("={}", version)]),
        "" => Ok(vec![format!("{}.*", version)]),
        "~>" => pessimistic(version),
        _ => Ok(vec![format!("{}{}", op, strip_wildcards(version))]),
    }
}

/// Ruby-style `~>`: `~> 1.2` allows `< 2.0`, `~> 1.2.3` allows `< 1.3.0`.
fn pessimistic(version: &str) -> std::result::Result<Vec<String>, String> {
    let parts: Vec<u64> = version
        .split('.')
        .map(|p| p.parse::<u64>().map_err(|_| format!("invalid version '{}'", version)))
        .collect::<std::result::Result<_, _>>()?;
    match parts.as_slice() {
        [major] => Ok(vec![format!(">={}", major), format!("<{}", bump(*major)?)]),
        [major, minor] => Ok(vec![
            format!(">={}.{}", major, minor),
            format!("<{}.0.0", bump(*major)?),
        ]),
        [major, minor, patch, ..] => Ok(vec![
            format!(">={}.{}.{}", major, minor, patch),
            format!("<{}.{}.0", major, bump(*minor)?),
        ]),
        [] => Err("empty version".to_string()),
    }
}

fn bump(component: u64) -> std::result::Result<u64, String> {
    component
        .checked_add(1)
        .ok_or_else(|| format!("version component {} too large", component))
}

fn strip_wildcards(version: &str) -> String {
    version
        .split('.')
        .take_while(|p| *p != "*" && *p != "x" && *p != "X")
        .collect::<Vec<_>>()
        .join(".")
}
