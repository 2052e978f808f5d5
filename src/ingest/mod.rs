//! Filesystem ingestion for the content cache.
//!
//! ```text
//! source dir → notify (debounced) → SourceEvent → SourceEvents → Catalog
//!                                                  (WatchPipeline)
//! ```

pub mod watcher;

pub use watcher::{
    PipelineState, SourceEvent, SourceEvents, WatchError, WatchPipeline, WatcherConfig,
};
