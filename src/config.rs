//! User configuration management
//!
//! Settings are stored in TOML format at `~/.modbridge/config.toml`. Every
//! field has a default, so a missing file or a partial file is fine.
//!
//! # Examples
//!
//! ```no_run
//! use modbridge::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//!
//! println!("Priority marker: {}", config.archives.priority_marker);
//! println!("Max chain depth: {}", config.resolver.max_depth);
//!
//! let mut config = config;
//! config.archives.search_paths.push("~/games/zh/Data".to_string());
//! config.save()?;
//! # Ok(())
//! # }
//! ```

use crate::archive::DEFAULT_PRIORITY_MARKER;
use crate::policy::{
    DEFAULT_ALLOWED_KINDS, DEFAULT_CINEMATIC_PREFIX, DEFAULT_FORBIDDEN_KINDS, MAX_CHAIN_DEPTH,
    MAX_WEAPON_DEPENDENCIES,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// User configuration file (`~/.modbridge/config.toml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Archive mounting settings
    #[serde(default)]
    pub archives: ArchivesConfig,

    /// Dependency resolver settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Acceptance policy settings
    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivesConfig {
    /// Container name marker that raises priority (default: "!!")
    #[serde(default = "default_priority_marker")]
    pub priority_marker: String,

    /// Extension of container files when scanning directories
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Files or directories mounted when no sources are given on the command line
    #[serde(default)]
    pub search_paths: Vec<String>,
}

fn default_priority_marker() -> String {
    DEFAULT_PRIORITY_MARKER.to_string()
}

fn default_extension() -> String {
    "big".to_string()
}

impl Default for ArchivesConfig {
    fn default() -> Self {
        Self {
            priority_marker: default_priority_marker(),
            extension: default_extension(),
            search_paths: Vec::new(),
        }
    }
}

impl ArchivesConfig {
    /// Search paths with `~` and environment variables expanded
    pub fn expanded_search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.iter().map(|p| expand_path(p)).collect()
    }
}

/// Dependency resolver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Deepest level a dependency may sit at (default: 4)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Expand referenced assets through their own definitions instead of one hop
    #[serde(default)]
    pub follow_definitions: bool,
}

fn default_max_depth() -> usize {
    MAX_CHAIN_DEPTH
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            follow_definitions: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Most dependencies a weapon chain or unit graph may have (default: 80)
    #[serde(default = "default_max_dependencies")]
    pub max_dependencies: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// KindOf tokens that make a unit transferable
    #[serde(default = "default_allowed_kinds")]
    pub allowed_kinds: Vec<String>,

    /// KindOf tokens that always reject, even alongside an allowed one
    #[serde(default = "default_forbidden_kinds")]
    pub forbidden_kinds: Vec<String>,

    #[serde(default = "default_cinematic_prefix")]
    pub cinematic_prefix: String,
}

fn default_max_dependencies() -> usize {
    MAX_WEAPON_DEPENDENCIES
}

fn default_allowed_kinds() -> Vec<String> {
    DEFAULT_ALLOWED_KINDS.iter().map(|s| s.to_string()).collect()
}

fn default_forbidden_kinds() -> Vec<String> {
    DEFAULT_FORBIDDEN_KINDS.iter().map(|s| s.to_string()).collect()
}

fn default_cinematic_prefix() -> String {
    DEFAULT_CINEMATIC_PREFIX.to_string()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_dependencies: default_max_dependencies(),
            max_depth: default_max_depth(),
            allowed_kinds: default_allowed_kinds(),
            forbidden_kinds: default_forbidden_kinds(),
            cinematic_prefix: default_cinematic_prefix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `--verbose` is not given (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// Uses MODBRIDGE_CONFIG_DIR if set, otherwise ~/.modbridge/config.toml
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(config_dir) = std::env::var("MODBRIDGE_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir).join("config.toml"));
        }

        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| Error::Other("Could not find home directory".to_string()))?;

        Ok(PathBuf::from(home).join(".modbridge").join("config.toml"))
    }

    /// Load config from the default path, or defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path()?)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Expand `~` and `$VAR` in a configured path, leaving it as-is on failure
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(path),
    }
}
