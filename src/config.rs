//! Configuration for folio paths and cache behavior.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FOLIO_HOME, FOLIO_SOURCE, FOLIO_SIDECARS)
//! 2. Config file (.folio/config.yaml)
//! 3. Defaults (~/.folio)
//!
//! Config file discovery:
//! - Searches current directory and parents for .folio/config.yaml
//! - `source` and `sidecars` are relative to the project root (the parent of
//!   `.folio/`); `home` is relative to `.folio/` itself

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::ingest::WatcherConfig;
use crate::library::{CatalogConfig, MissingSidecarPolicy};

pub mod paths;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub watch: Option<WatchConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Folio state directory (relative to .folio/)
    pub home: Option<String>,
    /// Source directory of posts (relative to project root)
    pub source: Option<String>,
    /// Sidecar directory (relative to project root)
    pub sidecars: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub extension: Option<String>,
    pub store_rendered: Option<bool>,
    pub missing_sidecar: Option<MissingSidecarPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    pub debounce_ms: Option<u64>,
    pub reconcile_on_start: Option<bool>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Folio state directory
    pub home: PathBuf,
    /// Directory of authored posts
    pub source: PathBuf,
    /// Directory of sidecars
    pub sidecars: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Cache settings
    pub cache: CacheSettings,
    /// Watcher settings
    pub watch: WatcherConfig,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub extension: String,
    pub store_rendered: bool,
    pub missing_sidecar: MissingSidecarPolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            extension: "md".to_string(),
            store_rendered: true,
            missing_sidecar: MissingSidecarPolicy::Warn,
        }
    }
}

impl ResolvedConfig {
    /// Catalog settings derived from this configuration
    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig {
            source_dir: self.source.clone(),
            sidecar_dir: self.sidecars.clone(),
            extension: self.cache.extension.clone(),
            store_rendered: self.cache.store_rendered,
            missing_sidecar: self.cache.missing_sidecar,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(paths::CONFIG_DIR_NAME).join(paths::CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge file settings over defaults
fn cache_settings(file: Option<&CacheConfig>) -> CacheSettings {
    let defaults = CacheSettings::default();
    match file {
        Some(cache) => CacheSettings {
            extension: cache.extension.clone().unwrap_or(defaults.extension),
            store_rendered: cache.store_rendered.unwrap_or(defaults.store_rendered),
            missing_sidecar: cache.missing_sidecar.unwrap_or(defaults.missing_sidecar),
        },
        None => defaults,
    }
}

fn watch_settings(file: Option<&WatchConfig>) -> WatcherConfig {
    let defaults = WatcherConfig::default();
    match file {
        Some(watch) => WatcherConfig {
            debounce_ms: watch.debounce_ms.unwrap_or(defaults.debounce_ms),
            reconcile_on_start: watch
                .reconcile_on_start
                .unwrap_or(defaults.reconcile_on_start),
        },
        None => defaults,
    }
}

/// Resolve a parsed config file found at `config_path`
fn resolve_config_file(
    config: &ConfigFile,
    config_path: &Path,
    default_home: &Path,
) -> (PathBuf, PathBuf, PathBuf) {
    // Base directory is the parent of .folio/ (i.e., grandparent of config.yaml)
    let folio_dir = config_path.parent().unwrap_or(Path::new("."));
    let base_dir = folio_dir.parent().unwrap_or(Path::new("."));

    let home = if let Ok(env_home) = std::env::var("FOLIO_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = config.paths.home {
        resolve_path(folio_dir, home_path)
    } else {
        default_home.to_path_buf()
    };

    let source = if let Ok(env_source) = std::env::var("FOLIO_SOURCE") {
        PathBuf::from(env_source)
    } else if let Some(ref source_path) = config.paths.source {
        resolve_path(base_dir, source_path)
    } else {
        home.join("posts")
    };

    let sidecars = if let Ok(env_sidecars) = std::env::var("FOLIO_SIDECARS") {
        PathBuf::from(env_sidecars)
    } else if let Some(ref sidecar_path) = config.paths.sidecars {
        resolve_path(base_dir, sidecar_path)
    } else {
        home.join("sidecars")
    };

    (home, source, sidecars)
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".folio");

    let config_file = find_config_file();

    let (home, source, sidecars, cache, watch) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;
        let (home, source, sidecars) = resolve_config_file(&config, config_path, &default_home);

        (
            home,
            source,
            sidecars,
            cache_settings(config.cache.as_ref()),
            watch_settings(config.watch.as_ref()),
        )
    } else {
        // No config file - use env vars or defaults
        let home = std::env::var("FOLIO_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        let source = std::env::var("FOLIO_SOURCE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("posts"));

        let sidecars = std::env::var("FOLIO_SIDECARS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("sidecars"));

        (
            home,
            source,
            sidecars,
            CacheSettings::default(),
            WatcherConfig::default(),
        )
    };

    Ok(ResolvedConfig {
        home,
        source,
        sidecars,
        config_file,
        cache,
        watch,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
