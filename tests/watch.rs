//! Watch Pipeline Integration Tests
//!
//! Drives a real notify watcher over a temporary source directory and waits
//! for the catalog to catch up.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use folio::{
    Catalog, CatalogConfig, MarkdownRenderer, PipelineState, SortKey, WatchPipeline,
    WatcherConfig,
};
use tempfile::TempDir;
use tokio::time::{sleep, Instant};

/// Poll until `check` passes or the deadline expires
async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(15);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(100)).await;
    }
    check()
}

fn setup(temp: &TempDir) -> (Arc<Catalog>, Arc<WatchPipeline>) {
    let source = temp.path().join("md");
    fs::create_dir_all(&source).unwrap();

    let catalog = Arc::new(Catalog::new(
        CatalogConfig::new(&source, temp.path().join("blogs")),
        Arc::new(MarkdownRenderer::new()),
    ));
    let pipeline = WatchPipeline::with_config(
        Arc::clone(&catalog),
        WatcherConfig {
            debounce_ms: 100,
            reconcile_on_start: true,
        },
    );

    (catalog, pipeline)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_tracks_create_modify_delete() {
    let temp = TempDir::new().unwrap();
    let (catalog, pipeline) = setup(&temp);
    let source = catalog.store().source_dir().to_path_buf();
    let sidecar = catalog.store().sidecar_dir().join("live.json");

    catalog.rebuild(None, SortKey::default()).unwrap();
    pipeline.start().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Watching);

    let path = source.join("live.md");
    fs::write(&path, "{news}\nFirst draft").unwrap();
    assert!(
        wait_for(|| catalog
            .snapshot()
            .iter()
            .any(|r| r.identity().as_str() == "live" && r.canonical_content() == "First draft"))
        .await,
        "created post never reached the catalog"
    );
    assert!(sidecar.exists());

    fs::write(&path, "{news}{pinned}\nSecond draft").unwrap();
    assert!(
        wait_for(|| catalog
            .snapshot()
            .iter()
            .any(|r| r.canonical_content() == "Second draft" && r.pinned()))
        .await,
        "modification never reached the catalog"
    );

    // Backup files are ignored entirely
    fs::write(source.join("live.md~"), "backup").unwrap();

    fs::remove_file(&path).unwrap();
    assert!(
        wait_for(|| catalog.snapshot().is_empty() && !sidecar.exists()).await,
        "deletion never reached the catalog"
    );

    pipeline.stop().await.unwrap();
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(catalog.store().list_sidecars().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_events_after_stop_are_not_applied() {
    let temp = TempDir::new().unwrap();
    let (catalog, pipeline) = setup(&temp);
    let source = catalog.store().source_dir().to_path_buf();

    pipeline.start().unwrap();
    pipeline.stop().await.unwrap();

    fs::write(source.join("quiet.md"), "Nobody is listening").unwrap();
    sleep(Duration::from_millis(500)).await;

    assert!(catalog.snapshot().is_empty());
    assert!(catalog.store().list_sidecars().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_reconciles_orphans() {
    let temp = TempDir::new().unwrap();
    let (catalog, pipeline) = setup(&temp);

    fs::create_dir_all(catalog.store().sidecar_dir()).unwrap();
    fs::write(catalog.store().sidecar_dir().join("ghost.json"), "{}").unwrap();

    pipeline.start().unwrap();
    assert!(catalog.store().list_sidecars().unwrap().is_empty());
    pipeline.stop().await.unwrap();
}
