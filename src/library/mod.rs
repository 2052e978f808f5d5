//! Content cache for authored posts.
//!
//! The source directory is the only source of truth. Everything under the
//! sidecar directory is derived from it and can be thrown away.
//!
//! # Storage Layout
//!
//! ```text
//! <source_dir>/
//! └── <identity>.md         # "{tag}{pinned}" line (optional) + Markdown body
//! <sidecar_dir>/
//! └── <identity>.json       # title, canonical_content, rendered_content,
//!                           # tags, pinned, created_at, modified_at, fingerprint
//! ```

pub mod catalog;
pub mod error;
pub mod fingerprint;
pub mod header;
pub mod record;
pub mod store;

pub use catalog::{Catalog, CatalogConfig, EventOutcome, MissingSidecarPolicy, SortKey};
pub use error::{CacheError, CacheResult};
pub use fingerprint::{fingerprint, Fingerprint};
pub use header::{split_header, Header, PINNED_TAG};
pub use record::{ContentRecord, Identity, RecordOptions, Refresh};
pub use store::ContentStore;
