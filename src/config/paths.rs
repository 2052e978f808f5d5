//! Canonical paths for folio.
//!
//! Single source of truth - import this instead of hardcoding paths.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio::config::paths;
//!
//! let posts = paths::source_dir()?;
//! let sidecar = paths::sidecar_file("hello-world")?;
//! ```
//!
//! ## Path Ownership
//!
//! | Location | Owner | Purpose |
//! |----------|-------|---------|
//! | source_dir | Author | Authored posts, never written by folio |
//! | sidecar_dir | folio | Cached record state, safe to delete |

use std::path::PathBuf;

use anyhow::Result;

/// Name of the per-project configuration directory
pub const CONFIG_DIR_NAME: &str = ".folio";

/// Name of the configuration file inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Get the folio home directory (~/.folio)
pub fn folio_home() -> Result<PathBuf> {
    Ok(crate::config::config()?.home.clone())
}

/// Get the source directory of authored posts
pub fn source_dir() -> Result<PathBuf> {
    Ok(crate::config::config()?.source.clone())
}

/// Get the sidecar directory
pub fn sidecar_dir() -> Result<PathBuf> {
    Ok(crate::config::config()?.sidecars.clone())
}

/// Get the sidecar path for an identity
pub fn sidecar_file(identity: &str) -> Result<PathBuf> {
    Ok(sidecar_dir()?.join(format!(
        "{}.{}",
        identity,
        crate::library::store::SIDECAR_EXTENSION
    )))
}
