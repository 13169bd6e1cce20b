//! Project configuration (`modsync.toml`) and the resolved [`Environment`].

use crate::module::ModuleName;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MANIFEST_FILE: &str = "modsync.toml";
pub const DEFAULT_FORGE_URL: &str = "https://forgeapi.puppet.com";
pub const DEFAULT_SPECFILE: &str = "Modulesfile";

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleEntry>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Settings {
    pub install_dir: Option<String>,
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub destructive: bool,
    #[serde(default)]
    pub rsync: bool,
    #[serde(default = "default_true")]
    pub forge_resolution: bool,
    pub specfile: Option<String>,
    pub forge: Option<String>,
    pub command_timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub legacy_modulefile: bool,
    #[serde(default)]
    pub verbose: bool,
}

/// One `[modules]` entry. A bare string is a forge version.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ModuleEntry {
    Forge(String),
    Detailed {
        git: Option<String>,
        #[serde(rename = "ref")]
        reference: Option<String>,
        path: Option<String>,
        version: Option<String>,
    },
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            install_dir: None,
            cache_dir: None,
            destructive: false,
            rsync: false,
            forge_resolution: true,
            specfile: None,
            forge: None,
            command_timeout_secs: None,
            legacy_modulefile: true,
            verbose: false,
        }
    }
}

impl ProjectConfig {
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Resolved, read-only view of everything the synchronizer needs from its host.
#[derive(Debug, Clone)]
pub struct Environment {
    pub project_path: PathBuf,
    pub install_root: PathBuf,
    pub cache_root: PathBuf,
    pub verbose: bool,
    pub git_destructive: bool,
    pub rsync: bool,
    pub use_forge_resolution: bool,
    pub specfile_name: String,
    pub forge_url: String,
    pub command_timeout: Duration,
    pub legacy_modulefile: bool,
}

impl Environment {
    /// Defaults rooted at `project_path`, with the cache kept inside the project.
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        let project_path = project_path.into();
        Self {
            install_root: project_path.join("modules"),
            cache_root: project_path.join(".modsync").join("cache"),
            project_path,
            verbose: false,
            git_destructive: false,
            rsync: false,
            use_forge_resolution: true,
            specfile_name: DEFAULT_SPECFILE.to_string(),
            forge_url: DEFAULT_FORGE_URL.to_string(),
            command_timeout: Duration::from_secs(120),
            legacy_modulefile: true,
        }
    }

    /// Builds the environment from `settings`, then applies `MODSYNC_*` overrides.
    pub fn from_settings(project_path: &Path, settings: &Settings) -> Result<Self> {
        let mut env = Self::new(project_path);

        if let Some(dir) = &settings.install_dir {
            env.install_root = project_path.join(dir);
        }
        env.cache_root = match settings.cache_dir.as_deref() {
            Some(dir) => expand_home(dir)?,
            None => default_cache_root()?,
        };
        env.git_destructive = settings.destructive;
        env.rsync = settings.rsync;
        env.use_forge_resolution = settings.forge_resolution;
        env.verbose = settings.verbose;
        env.legacy_modulefile = settings.legacy_modulefile;
        if let Some(name) = &settings.specfile {
            env.specfile_name = name.clone();
        }
        if let Some(url) = &settings.forge {
            env.forge_url = url.clone();
        }
        if let Some(secs) = settings.command_timeout_secs {
            env.command_timeout = Duration::from_secs(secs);
        }

        env.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(env)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("MODSYNC_DESTRUCTIVE") {
            self.git_destructive = parse_flag(&v);
        }
        if let Some(v) = lookup("MODSYNC_RSYNC") {
            self.rsync = parse_flag(&v);
        }
        if let Some(v) = lookup("MODSYNC_FORGE_RESOLUTION") {
            self.use_forge_resolution = parse_flag(&v);
        }
        if let Some(v) = lookup("MODSYNC_VERBOSE") {
            self.verbose = parse_flag(&v);
        }
        if let Some(v) = lookup("MODSYNC_CACHE_DIR") {
            self.cache_root = expand_home(&v)?;
        }
        Ok(())
    }

    /// Where `name` gets installed. Always derived, never user-supplied.
    pub fn install_path(&self, name: &ModuleName) -> PathBuf {
        self.install_root.join(name.short_name())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn default_cache_root() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".modsync").join("cache"))
}

fn expand_home(dir: &str) -> Result<PathBuf> {
    if let Some(rest) = dir.strip_prefix("~/") {
        let home = dirs::home_dir().context("Could not find home directory")?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parse() {
        let toml_str = r#"
[settings]
install_dir = "vendor/modules"
destructive = true
specfile = "Puppetfile.rhai"

[modules]
"puppetlabs-stdlib" = "4.25.0"
"myorg-app" = { git = "https://example.com/app.git", ref = "main" }
"myorg-local" = { path = "../local" }
"#;
        let config: ProjectConfig = toml::from_str(toml_str).unwrap();
        assert!(config.settings.destructive);
        assert!(config.settings.forge_resolution);
        assert_eq!(
            config.modules["puppetlabs-stdlib"],
            ModuleEntry::Forge("4.25.0".to_string())
        );
        match &config.modules["myorg-app"] {
            ModuleEntry::Detailed { git, reference, .. } => {
                assert_eq!(git.as_deref(), Some("https://example.com/app.git"));
                assert_eq!(reference.as_deref(), Some("main"));
            }
            _ => panic!("Expected Detailed variant"),
        }
    }

    #[test]
    fn test_install_path_uses_short_name() {
        let env = Environment::new("/work/project");
        let name = ModuleName::new("puppetlabs-stdlib");
        assert_eq!(
            env.install_path(&name),
            PathBuf::from("/work/project/modules/stdlib")
        );
        let slashed = ModuleName::new("puppetlabs/apache");
        assert_eq!(
            env.install_path(&slashed),
            PathBuf::from("/work/project/modules/apache")
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut env = Environment::new("/work/project");
        env.apply_overrides(|key| match key {
            "MODSYNC_DESTRUCTIVE" => Some("yes".to_string()),
            "MODSYNC_FORGE_RESOLUTION" => Some("0".to_string()),
            "MODSYNC_CACHE_DIR" => Some("/tmp/modsync-cache".to_string()),
            _ => None,
        })
        .unwrap();
        assert!(env.git_destructive);
        assert!(!env.use_forge_resolution);
        assert_eq!(env.cache_root, PathBuf::from("/tmp/modsync-cache"));
    }

    #[test]
    fn test_missing_manifest_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert!(config.modules.is_empty());
        assert!(config.settings.forge_resolution);
        assert!(config.settings.legacy_modulefile);
    }
}
