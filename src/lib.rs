//! folio - cached, searchable view over a directory of Markdown posts
//!
//! The source directory is authoritative. folio keeps a sidecar per post
//! holding its parsed state (tags, pin flag, timestamps, rendered output)
//! and reconciles that cache whenever a query arrives or a file changes.
//!
//! # Architecture
//!
//! - Every post is a `ContentRecord`, loaded from its sidecar and refreshed
//!   only when the fingerprint of its canonical content changes
//! - The `Catalog` owns the ordered snapshot (pinned posts first) and
//!   serializes every write
//! - The `WatchPipeline` feeds filesystem notifications into the catalog
//!
//! # Modules
//!
//! - `adapters`: Page renderer contract and the Markdown renderer
//! - `config`: Layered configuration (env, `.folio/config.yaml`, defaults)
//! - `ingest`: Filesystem watcher
//! - `library`: Records, sidecar store and catalog
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # List posts, newest first, pinned on top
//! folio list
//!
//! # Search content, titles and tags
//! folio list --query rust --sort modified-desc
//!
//! # Keep the cache in sync while editing
//! folio watch
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod ingest;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{MarkdownRenderer, PageRenderer};
pub use ingest::{PipelineState, SourceEvent, SourceEvents, WatchError, WatchPipeline, WatcherConfig};
pub use library::{
    fingerprint, CacheError, Catalog, CatalogConfig, ContentRecord, EventOutcome, Fingerprint,
    Identity, MissingSidecarPolicy, Refresh, SortKey,
};
