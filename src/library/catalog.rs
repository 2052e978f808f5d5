//! Catalog of every cached post.
//!
//! The catalog is a materialized view over the source directory and the
//! sidecar store. Readers get an `Arc` snapshot that is swapped wholesale, so
//! nobody ever sees a half-sorted list. All writes (rebuilds, filesystem
//! events, garbage collection) are serialized behind one writer lock plus an
//! advisory file lock on the sidecar store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::{Deserialize, Serialize};

use super::error::{CacheError, CacheResult};
use super::record::{ContentRecord, Identity, RecordOptions, Refresh};
use super::store::{ContentStore, StoreLock};
use crate::adapters::PageRenderer;

/// Ordering applied within the pinned and unpinned partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    CreatedAsc,
    #[default]
    CreatedDesc,
    ModifiedAsc,
    ModifiedDesc,
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::CreatedAsc => write!(f, "created-asc"),
            SortKey::CreatedDesc => write!(f, "created-desc"),
            SortKey::ModifiedAsc => write!(f, "modified-asc"),
            SortKey::ModifiedDesc => write!(f, "modified-desc"),
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "created-asc" | "created_asc" | "oldest" => Ok(SortKey::CreatedAsc),
            "created-desc" | "created_desc" | "newest" => Ok(SortKey::CreatedDesc),
            "modified-asc" | "modified_asc" => Ok(SortKey::ModifiedAsc),
            "modified-desc" | "modified_desc" | "updated" => Ok(SortKey::ModifiedDesc),
            _ => anyhow::bail!("Unknown sort key: {}", s),
        }
    }
}

/// What to do when a source is deleted but no sidecar exists for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSidecarPolicy {
    /// Log a warning and carry on
    #[default]
    Warn,

    /// Report `CacheError::MissingSidecarOnDelete`
    Error,
}

/// Settings for a catalog instance
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Directory holding the authored posts
    pub source_dir: PathBuf,

    /// Directory holding the sidecars
    pub sidecar_dir: PathBuf,

    /// Extension of tracked source files (without the dot)
    pub extension: String,

    /// Persist rendered output in sidecars
    pub store_rendered: bool,

    /// Policy for delete events without a sidecar
    pub missing_sidecar: MissingSidecarPolicy,
}

impl CatalogConfig {
    /// Config with default settings for the given directories
    pub fn new(source_dir: impl Into<PathBuf>, sidecar_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            sidecar_dir: sidecar_dir.into(),
            extension: "md".to_string(),
            store_rendered: true,
            missing_sidecar: MissingSidecarPolicy::default(),
        }
    }

    pub fn with_missing_sidecar(mut self, policy: MissingSidecarPolicy) -> Self {
        self.missing_sidecar = policy;
        self
    }

    pub fn with_store_rendered(mut self, store: bool) -> Self {
        self.store_rendered = store;
        self
    }
}

/// Result of handling a single filesystem event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Path is not a tracked source; nothing changed
    Ignored,

    /// Record was loaded and brought up to date
    Refreshed { identity: Identity, refresh: Refresh },

    /// Sidecar removed and record dropped
    Removed(Identity),

    /// Source deleted but it never had a sidecar
    NoSidecar(Identity),
}

/// The currently installed ordering, plus how it was produced
#[derive(Debug, Clone, Default)]
struct View {
    query: Option<String>,
    sort: SortKey,
    records: Arc<Vec<ContentRecord>>,
}

/// Held for the duration of every catalog write
struct WriteGuard<'a> {
    _store: StoreLock,
    _writer: MutexGuard<'a, ()>,
}

/// Shared, ordered view of all cached posts
pub struct Catalog {
    store: ContentStore,
    options: RecordOptions,
    missing_sidecar: MissingSidecarPolicy,
    renderer: Arc<dyn PageRenderer>,
    writer: Mutex<()>,
    view: RwLock<View>,
}

impl Catalog {
    /// Create a catalog; nothing is read until the first rebuild or event
    pub fn new(config: CatalogConfig, renderer: Arc<dyn PageRenderer>) -> Self {
        Self {
            store: ContentStore::new(config.source_dir, config.sidecar_dir, config.extension),
            options: RecordOptions {
                store_rendered: config.store_rendered,
            },
            missing_sidecar: config.missing_sidecar,
            renderer,
            writer: Mutex::new(()),
            view: RwLock::new(View::default()),
        }
    }

    /// Underlying file layout
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Current snapshot, in catalog order
    pub fn snapshot(&self) -> Arc<Vec<ContentRecord>> {
        let view = self.view.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&view.records)
    }

    /// Re-read every source, refresh stale records, then filter and order them.
    ///
    /// Records that fail to load are logged and left out; only a failure to
    /// enumerate the source directory fails the whole rebuild.
    pub fn rebuild(
        &self,
        query: Option<&str>,
        sort: SortKey,
    ) -> CacheResult<Arc<Vec<ContentRecord>>> {
        let _guard = self.lock_writer()?;

        let identities = self.store.list_identities()?;
        let mut records = Vec::with_capacity(identities.len());
        let mut failed = 0usize;

        for identity in identities {
            match self.load_record(&identity) {
                Ok((record, _)) => records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", identity, e);
                    failed += 1;
                }
            }
        }

        let query = query.map(str::to_string);
        let records = Arc::new(arrange(records, query.as_deref(), sort));

        tracing::debug!(
            "Rebuilt catalog: {} records ({} skipped), sort {}",
            records.len(),
            failed,
            sort
        );

        self.install(View {
            query,
            sort,
            records: Arc::clone(&records),
        });

        Ok(records)
    }

    /// Remove every sidecar whose source file no longer exists.
    ///
    /// Returns the identities that were collected.
    pub fn reconcile_on_startup(&self) -> CacheResult<Vec<Identity>> {
        let _guard = self.lock_writer()?;

        let mut removed = Vec::new();
        for identity in self.store.list_sidecars()? {
            if self.store.source_path(&identity).exists() {
                continue;
            }

            let orphan = CacheError::OrphanSidecar(self.store.sidecar_path(&identity));
            tracing::warn!("{}; removing", orphan);

            match self.store.remove_sidecar(&identity) {
                Ok(_) => removed.push(identity),
                Err(e) => tracing::warn!("Failed to remove orphan: {}", e),
            }
        }

        if !removed.is_empty() {
            self.patch(|records| records.retain(|r| !removed.contains(r.identity())));
            tracing::info!("Collected {} orphaned sidecar(s)", removed.len());
        }

        Ok(removed)
    }

    /// Handle a source file appearing
    pub fn on_created(&self, path: &Path) -> CacheResult<EventOutcome> {
        self.upsert_from_path(path)
    }

    /// Handle a source file changing
    pub fn on_modified(&self, path: &Path) -> CacheResult<EventOutcome> {
        self.upsert_from_path(path)
    }

    /// Handle a source file disappearing
    pub fn on_deleted(&self, path: &Path) -> CacheResult<EventOutcome> {
        let identity = match self.store.identity_for(path) {
            Some(identity) => identity,
            None => {
                tracing::debug!("Ignoring delete of {}", path.display());
                return Ok(EventOutcome::Ignored);
            }
        };

        let _guard = self.lock_writer()?;

        let existed = self.store.remove_sidecar(&identity)?;
        self.patch(|records| records.retain(|r| r.identity() != &identity));

        if existed {
            tracing::info!("Removed {}", identity);
            return Ok(EventOutcome::Removed(identity));
        }

        let err = CacheError::MissingSidecarOnDelete(self.store.sidecar_path(&identity));
        match self.missing_sidecar {
            MissingSidecarPolicy::Warn => {
                tracing::warn!("{}", err);
                Ok(EventOutcome::NoSidecar(identity))
            }
            MissingSidecarPolicy::Error => Err(err),
        }
    }

    /// Load one record, refreshing it from its source
    pub fn get(&self, identity: &Identity) -> CacheResult<ContentRecord> {
        let _guard = self.lock_writer()?;
        let (record, _) = self.load_record(identity)?;
        self.upsert(record.clone());
        Ok(record)
    }

    fn upsert_from_path(&self, path: &Path) -> CacheResult<EventOutcome> {
        let identity = match self.store.identity_for(path) {
            Some(identity) => identity,
            None => {
                tracing::debug!("Ignoring {}", path.display());
                return Ok(EventOutcome::Ignored);
            }
        };

        let _guard = self.lock_writer()?;
        let (record, refresh) = self.load_record(&identity)?;
        self.upsert(record);

        tracing::debug!("{}: {:?}", identity, refresh);
        Ok(EventOutcome::Refreshed { identity, refresh })
    }

    /// Load or create a record and bring it in line with its source
    fn load_record(&self, identity: &Identity) -> CacheResult<(ContentRecord, Refresh)> {
        let mut record = ContentRecord::initialize(identity.clone(), &self.store, self.options)?;
        let raw = record.read_source()?;
        let refresh = record.refresh_if_stale(&raw, self.renderer.as_ref())?;

        if !record.is_persisted() {
            record.persist()?;
        }
        record.ensure_rendered(self.renderer.as_ref());

        Ok((record, refresh))
    }

    fn upsert(&self, record: ContentRecord) {
        self.patch(|records| {
            records.retain(|r| r.identity() != record.identity());
            records.push(record);
        });
    }

    /// Apply an edit to a copy of the current records and swap it in
    fn patch(&self, edit: impl FnOnce(&mut Vec<ContentRecord>)) {
        let current = {
            let view = self.view.read().unwrap_or_else(|e| e.into_inner());
            view.clone()
        };

        let mut records = current.records.as_ref().clone();
        edit(&mut records);
        let records = arrange(records, current.query.as_deref(), current.sort);

        self.install(View {
            records: Arc::new(records),
            ..current
        });
    }

    fn install(&self, view: View) {
        let mut slot = self.view.write().unwrap_or_else(|e| e.into_inner());
        *slot = view;
    }

    fn lock_writer(&self) -> CacheResult<WriteGuard<'_>> {
        let writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let store = self.store.lock()?;
        Ok(WriteGuard {
            _store: store,
            _writer: writer,
        })
    }
}

/// Filter by query, then order pinned records ahead of the rest
fn arrange(records: Vec<ContentRecord>, query: Option<&str>, sort: SortKey) -> Vec<ContentRecord> {
    let needle = query.map(str::to_lowercase);

    let (mut pinned, mut rest): (Vec<_>, Vec<_>) = records
        .into_iter()
        .filter(|r| needle.as_deref().map_or(true, |n| r.matches(n)))
        .partition(|r| r.pinned());

    sort_records(&mut pinned, sort);
    sort_records(&mut rest, sort);

    pinned.extend(rest);
    pinned
}

fn sort_records(records: &mut [ContentRecord], sort: SortKey) {
    records.sort_by(|a, b| {
        let primary = match sort {
            SortKey::CreatedAsc => a.created_at().cmp(&b.created_at()),
            SortKey::CreatedDesc => b.created_at().cmp(&a.created_at()),
            SortKey::ModifiedAsc => a.modified_at().cmp(&b.modified_at()),
            SortKey::ModifiedDesc => b.modified_at().cmp(&a.modified_at()),
        };
        primary.then_with(|| a.identity().cmp(b.identity()))
    });
}
