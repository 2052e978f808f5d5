//! Source directory watcher.
//!
//! Subscribes to filesystem notifications for the source directory and turns
//! each one into a catalog operation. Events are handled one at a time on a
//! single blocking task, so two updates never race each other.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::library::{CacheError, Catalog, ContentStore, EventOutcome};

/// How often the loop checks for a stop request while idle
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Watcher is already running")]
    AlreadyWatching,

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Watcher task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration for the watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period before a burst of events on one path is delivered (ms)
    pub debounce_ms: u64,

    /// Garbage-collect orphaned sidecars when watching starts
    pub reconcile_on_start: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            reconcile_on_start: true,
        }
    }
}

/// Receiver of filesystem notifications for tracked sources
pub trait SourceEvents: Send + Sync {
    fn on_created(&self, path: &Path);
    fn on_modified(&self, path: &Path);
    fn on_deleted(&self, path: &Path);
}

/// A classified notification for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
}

impl SourceEvent {
    /// Classify a debounced path.
    ///
    /// Debounced notifications only say that something happened to a path,
    /// so the current state of the disk decides: a missing file was deleted,
    /// a file with a sidecar was modified, anything else was created.
    pub fn classify(store: &ContentStore, path: &Path) -> Option<Self> {
        let identity = store.identity_for(path)?;
        let path = path.to_path_buf();

        if !path.exists() {
            Some(SourceEvent::Deleted(path))
        } else if store.sidecar_path(&identity).exists() {
            Some(SourceEvent::Modified(path))
        } else {
            Some(SourceEvent::Created(path))
        }
    }

    /// Hand this event to a receiver
    pub fn dispatch(&self, events: &dyn SourceEvents) {
        match self {
            SourceEvent::Created(path) => events.on_created(path),
            SourceEvent::Modified(path) => events.on_modified(path),
            SourceEvent::Deleted(path) => events.on_deleted(path),
        }
    }
}

/// Lifecycle state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Watching,
}

/// Keeps a catalog in sync with its source directory
pub struct WatchPipeline {
    catalog: Arc<Catalog>,
    config: WatcherConfig,
    handle: Mutex<Option<WatchHandle>>,
}

impl WatchPipeline {
    /// Create an idle pipeline with default configuration
    pub fn new(catalog: Arc<Catalog>) -> Arc<Self> {
        Self::with_config(catalog, WatcherConfig::default())
    }

    /// Create an idle pipeline with custom configuration
    pub fn with_config(catalog: Arc<Catalog>, config: WatcherConfig) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            config,
            handle: Mutex::new(None),
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        let slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            PipelineState::Watching
        } else {
            PipelineState::Idle
        }
    }

    /// Idle → Watching. Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<(), WatchError> {
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Err(WatchError::AlreadyWatching);
        }

        let store = self.catalog.store().clone();
        let watch_path = store.source_dir().to_path_buf();
        if !watch_path.is_dir() {
            return Err(WatchError::DirectoryNotFound(watch_path));
        }

        if self.config.reconcile_on_start {
            self.catalog.reconcile_on_startup()?;
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer(Duration::from_millis(self.config.debounce_ms), tx)?;
        debouncer
            .watcher()
            .watch(&watch_path, RecursiveMode::NonRecursive)?;

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        // The loop must not keep the pipeline alive: dropping the pipeline
        // drops `stop_tx`, which ends the loop.
        let events: Weak<dyn SourceEvents> = Arc::downgrade(self) as Weak<dyn SourceEvents>;

        let task = tokio::task::spawn_blocking(move || {
            // Dropping the debouncer at the end of the loop unsubscribes.
            let _debouncer = debouncer;
            run_watcher(&store, &events, &rx, &mut stop_rx);
        });

        tracing::info!("Watching {} for changes", watch_path.display());
        *slot = Some(WatchHandle { stop_tx, task });

        Ok(())
    }

    /// Watching → Idle. Stopping an idle pipeline does nothing.
    pub async fn stop(&self) -> Result<(), WatchError> {
        let handle = {
            let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };

        match handle {
            Some(handle) => {
                handle.stop().await?;
                tracing::info!("Watcher stopped");
            }
            None => tracing::debug!("Watcher already idle"),
        }

        Ok(())
    }

    fn report(&self, kind: &str, path: &Path, result: Result<EventOutcome, CacheError>) {
        match result {
            Ok(EventOutcome::Ignored) => {}
            Ok(EventOutcome::Refreshed { identity, refresh }) => {
                tracing::info!("{} {}: {:?}", kind, identity, refresh)
            }
            Ok(EventOutcome::Removed(identity)) => tracing::info!("{} {}", kind, identity),
            Ok(EventOutcome::NoSidecar(identity)) => {
                tracing::debug!("{} {} (no sidecar)", kind, identity)
            }
            Err(e) => tracing::warn!("Failed to handle {} {}: {}", kind, path.display(), e),
        }
    }
}

impl Drop for WatchPipeline {
    fn drop(&mut self) {
        let slot = self.handle.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            let _ = handle.stop_tx.try_send(());
            tracing::debug!("Watcher dropped without stop; signalled loop to exit");
        }
    }
}

impl SourceEvents for WatchPipeline {
    fn on_created(&self, path: &Path) {
        self.report("created", path, self.catalog.on_created(path));
    }

    fn on_modified(&self, path: &Path) {
        self.report("modified", path, self.catalog.on_modified(path));
    }

    fn on_deleted(&self, path: &Path) {
        self.report("deleted", path, self.catalog.on_deleted(path));
    }
}

/// Handle to control a running watcher loop
struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    async fn stop(self) -> Result<(), WatchError> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

/// Internal watcher loop
fn run_watcher(
    store: &ContentStore,
    events: &Weak<dyn SourceEvents>,
    rx: &std::sync::mpsc::Receiver<DebounceEventResult>,
    stop_rx: &mut mpsc::Receiver<()>,
) {
    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(mpsc::error::TryRecvError::Disconnected) => {
                tracing::debug!("Watcher stopping...");
                break;
            }
            Err(mpsc::error::TryRecvError::Empty) => {}
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(batch)) => {
                let events = match events.upgrade() {
                    Some(events) => events,
                    None => {
                        tracing::debug!("Watcher owner gone, stopping...");
                        break;
                    }
                };

                for event in batch {
                    if let Some(event) = SourceEvent::classify(store, &event.path) {
                        event.dispatch(events.as_ref());
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Watcher error: {:?}", e);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("Watcher channel disconnected");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MarkdownRenderer;
    use crate::library::CatalogConfig;
    use tempfile::TempDir;

    fn pipeline(temp: &TempDir) -> Arc<WatchPipeline> {
        let source = temp.path().join("posts");
        std::fs::create_dir_all(&source).unwrap();
        let catalog = Catalog::new(
            CatalogConfig::new(source, temp.path().join("sidecars")),
            Arc::new(MarkdownRenderer::new()),
        );
        WatchPipeline::new(Arc::new(catalog))
    }

    #[test]
    fn test_classify() {
        let temp = TempDir::new().unwrap();
        let store = ContentStore::new(temp.path(), temp.path().join("sidecars"), "md");
        let post = temp.path().join("post.md");

        assert_eq!(
            SourceEvent::classify(&store, &post),
            Some(SourceEvent::Deleted(post.clone()))
        );

        std::fs::write(&post, "x").unwrap();
        assert_eq!(
            SourceEvent::classify(&store, &post),
            Some(SourceEvent::Created(post.clone()))
        );

        std::fs::create_dir_all(store.sidecar_dir()).unwrap();
        std::fs::write(store.sidecar_path(&crate::library::Identity::new("post")), "{}").unwrap();
        assert_eq!(
            SourceEvent::classify(&store, &post),
            Some(SourceEvent::Modified(post.clone()))
        );

        assert_eq!(SourceEvent::classify(&store, &temp.path().join("post.md~")), None);
    }

    #[test]
    fn test_trait_dispatch_updates_catalog() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp);
        let path = pipeline.catalog().store().source_dir().join("hello.md");

        std::fs::write(&path, "{greeting}\nHello").unwrap();
        SourceEvent::Created(path.clone()).dispatch(pipeline.as_ref());
        assert_eq!(pipeline.catalog().snapshot().len(), 1);

        std::fs::remove_file(&path).unwrap();
        SourceEvent::Deleted(path.clone()).dispatch(pipeline.as_ref());
        assert!(pipeline.catalog().snapshot().is_empty());

        // Second delete has no sidecar; warned, not fatal.
        pipeline.on_deleted(&path);
        assert!(pipeline.catalog().store().list_sidecars().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_missing_directory() {
        let temp = TempDir::new().unwrap();
        let catalog = Catalog::new(
            CatalogConfig::new(temp.path().join("missing"), temp.path().join("sidecars")),
            Arc::new(MarkdownRenderer::new()),
        );
        let pipeline = WatchPipeline::new(Arc::new(catalog));

        assert!(matches!(
            pipeline.start(),
            Err(WatchError::DirectoryNotFound(_))
        ));
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_start_stop_state_machine() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp);

        assert_eq!(pipeline.state(), PipelineState::Idle);
        pipeline.stop().await.unwrap();

        pipeline.start().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Watching);
        assert!(matches!(pipeline.start(), Err(WatchError::AlreadyWatching)));

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Idle);

        pipeline.start().unwrap();
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_pipeline_stops_applying_events() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("posts");
        std::fs::create_dir_all(&source).unwrap();
        let catalog = Arc::new(Catalog::new(
            CatalogConfig::new(&source, temp.path().join("sidecars")),
            Arc::new(MarkdownRenderer::new()),
        ));
        let pipeline = WatchPipeline::with_config(
            Arc::clone(&catalog),
            WatcherConfig {
                debounce_ms: 100,
                reconcile_on_start: false,
            },
        );

        pipeline.start().unwrap();
        let weak = Arc::downgrade(&pipeline);
        drop(pipeline);
        assert!(weak.upgrade().is_none());

        tokio::time::sleep(Duration::from_millis(800)).await;
        std::fs::write(source.join("ghost.md"), "Nobody is listening").unwrap();
        tokio::time::sleep(Duration::from_millis(800)).await;

        assert!(catalog.snapshot().is_empty());
        assert!(!catalog.store().sidecar_path(&crate::library::Identity::new("ghost")).exists());
    }

    #[test]
    fn test_runtime_shuts_down_with_running_watcher() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().to_path_buf();
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let source = root.join("posts");
                std::fs::create_dir_all(&source).unwrap();
                let catalog = Catalog::new(
                    CatalogConfig::new(source, root.join("sidecars")),
                    Arc::new(MarkdownRenderer::new()),
                );
                WatchPipeline::new(Arc::new(catalog)).start().unwrap();
            });
            drop(rt);
            let _ = done_tx.send(());
        });

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_start_collects_orphans() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp);
        let store = pipeline.catalog().store().clone();
        store.ensure_dirs().unwrap();
        std::fs::write(store.sidecar_dir().join("stale.json"), "{}").unwrap();

        pipeline.start().unwrap();
        assert!(store.list_sidecars().unwrap().is_empty());
        pipeline.stop().await.unwrap();
    }
}
