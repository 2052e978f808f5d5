//! Cached representation of a single post.
//!
//! A `ContentRecord` pairs a source file (`<identity>.md`) with its sidecar
//! (`<identity>.json`). The sidecar is only rewritten when the canonical
//! content (or the tag line) actually changes, which keeps `modified_at`
//! meaningful and makes repeated loads cheap.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{CacheError, CacheResult};
use super::fingerprint::{fingerprint, Fingerprint};
use super::header::{split_header, Header};
use super::store::{write_atomic, ContentStore};
use crate::adapters::PageRenderer;

/// Stable key of a post, taken from its source file's base name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derive an identity from a file path (its stem)
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        if stem.is_empty() {
            return None;
        }
        Some(Self(stem.to_string()))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Options affecting how records are loaded and persisted
#[derive(Debug, Clone, Copy)]
pub struct RecordOptions {
    /// Keep rendered output in the sidecar instead of recomputing it on load
    pub store_rendered: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            store_rendered: true,
        }
    }
}

/// What `refresh_if_stale` decided to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Source was empty or whitespace-only; state left untouched
    Skipped,

    /// Canonical content and tags match the sidecar
    Unchanged,

    /// Only the tag line changed; sidecar rewritten, `modified_at` kept
    TagsUpdated,

    /// Canonical content changed; reparsed, rendered and persisted
    Reparsed,
}

/// Sidecar file schema
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    title: String,
    canonical_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rendered_content: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    pinned: bool,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    #[serde(default)]
    fingerprint: Option<Fingerprint>,
}

/// Cached state of one post
#[derive(Debug, Clone)]
pub struct ContentRecord {
    identity: Identity,
    title: String,
    raw_source: Option<String>,
    canonical_content: String,
    tags: Vec<String>,
    pinned: bool,
    rendered_content: Option<String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    fingerprint: Option<Fingerprint>,
    source_path: PathBuf,
    sidecar_path: PathBuf,
    store_rendered: bool,
    persisted: bool,
}

impl ContentRecord {
    /// Load a record from its sidecar, or start fresh if there is none.
    ///
    /// A sidecar that fails to deserialize is logged and treated as absent;
    /// the next `persist` overwrites it.
    pub fn initialize(
        identity: Identity,
        store: &ContentStore,
        options: RecordOptions,
    ) -> CacheResult<Self> {
        let source_path = store.source_path(&identity);
        let sidecar_path = store.sidecar_path(&identity);

        let contents = match fs::read_to_string(&sidecar_path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(CacheError::io(&sidecar_path, e)),
        };

        let sidecar = match contents {
            Some(contents) => match serde_json::from_str::<Sidecar>(&contents) {
                Ok(sidecar) => Some(sidecar),
                Err(source) => {
                    let err = CacheError::CacheCorrupt {
                        path: sidecar_path.clone(),
                        source,
                    };
                    tracing::warn!("{}; starting fresh", err);
                    None
                }
            },
            None => None,
        };

        let record = match sidecar {
            Some(sidecar) => {
                let stored_fingerprint = sidecar
                    .fingerprint
                    .unwrap_or_else(|| fingerprint(&sidecar.canonical_content));
                let rendered_content = if options.store_rendered {
                    sidecar.rendered_content
                } else {
                    None
                };

                Self {
                    identity,
                    title: sidecar.title,
                    raw_source: None,
                    canonical_content: sidecar.canonical_content,
                    tags: sidecar.tags,
                    pinned: sidecar.pinned,
                    rendered_content,
                    created_at: sidecar.created_at,
                    modified_at: sidecar.modified_at.max(sidecar.created_at),
                    fingerprint: Some(stored_fingerprint),
                    source_path,
                    sidecar_path,
                    store_rendered: options.store_rendered,
                    persisted: true,
                }
            }
            None => {
                let now = Utc::now();
                Self {
                    title: identity.as_str().to_string(),
                    identity,
                    raw_source: None,
                    canonical_content: String::new(),
                    tags: Vec::new(),
                    pinned: false,
                    rendered_content: None,
                    created_at: now,
                    modified_at: now,
                    fingerprint: None,
                    source_path,
                    sidecar_path,
                    store_rendered: options.store_rendered,
                    persisted: false,
                }
            }
        };

        Ok(record)
    }

    /// Read the current source text for this record
    pub fn read_source(&self) -> CacheResult<String> {
        fs::read_to_string(&self.source_path).map_err(|source| CacheError::SourceUnreadable {
            path: self.source_path.clone(),
            source,
        })
    }

    /// Parse a raw source into canonical content, tags and pin flag.
    ///
    /// Empty or whitespace-only sources are ignored and the existing state is
    /// kept; returns whether parsing happened. Rendered output is dropped and
    /// must be regenerated with `ensure_rendered`.
    pub fn parse(&mut self, raw_source: &str) -> bool {
        if raw_source.trim().is_empty() {
            return false;
        }

        self.raw_source = Some(raw_source.to_string());
        let header = split_header(raw_source);
        self.apply_header(&header);
        true
    }

    fn apply_header(&mut self, header: &Header<'_>) {
        if self.canonical_content != header.body || self.fingerprint.is_none() {
            self.canonical_content = header.body.to_string();
            self.fingerprint = Some(fingerprint(&self.canonical_content));
            self.rendered_content = None;
        }
        self.tags = header.tags.clone();
        self.pinned = header.pinned;
    }

    /// Bring the record up to date with a freshly read source.
    ///
    /// The canonical body is fingerprinted and compared with the fingerprint
    /// from the last successful parse. Only a mismatch triggers a reparse,
    /// a render, a `modified_at` bump and a sidecar write.
    pub fn refresh_if_stale(
        &mut self,
        raw_source: &str,
        renderer: &dyn PageRenderer,
    ) -> CacheResult<Refresh> {
        if raw_source.trim().is_empty() {
            return Ok(Refresh::Skipped);
        }

        self.raw_source = Some(raw_source.to_string());
        let header = split_header(raw_source);
        let current = fingerprint(header.body);

        if self.fingerprint.as_ref() == Some(&current) {
            if self.tags == header.tags && self.pinned == header.pinned {
                return Ok(Refresh::Unchanged);
            }

            self.tags = header.tags;
            self.pinned = header.pinned;
            self.persist()?;
            return Ok(Refresh::TagsUpdated);
        }

        self.canonical_content = header.body.to_string();
        self.tags = header.tags;
        self.pinned = header.pinned;
        self.fingerprint = Some(current);
        self.rendered_content =
            Some(renderer.render(&self.canonical_content, self.identity.as_str()));
        self.modified_at = Utc::now().max(self.created_at);
        self.persist()?;

        Ok(Refresh::Reparsed)
    }

    /// Write the full record state to its sidecar, replacing any existing file
    pub fn persist(&mut self) -> CacheResult<()> {
        let sidecar = Sidecar {
            title: self.title.clone(),
            canonical_content: self.canonical_content.clone(),
            rendered_content: if self.store_rendered {
                self.rendered_content.clone()
            } else {
                None
            },
            tags: self.tags.clone(),
            pinned: self.pinned,
            created_at: self.created_at,
            modified_at: self.modified_at,
            fingerprint: self.fingerprint.clone(),
        };

        let json = serde_json::to_string_pretty(&sidecar)?;
        write_atomic(&self.sidecar_path, &json)?;
        self.persisted = true;

        Ok(())
    }

    /// Fill in rendered output when it is not already cached
    pub fn ensure_rendered(&mut self, renderer: &dyn PageRenderer) {
        if self.rendered_content.is_none() {
            self.rendered_content =
                Some(renderer.render(&self.canonical_content, self.identity.as_str()));
        }
    }

    /// Comma-separated tags for display
    pub fn formatted_tags(&self) -> String {
        self.tags.join(", ")
    }

    pub fn has_no_tags(&self) -> bool {
        self.tags.is_empty()
    }

    /// Case-insensitive substring match over content, title and tags.
    ///
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.canonical_content.to_lowercase().contains(needle)
            || self.title.to_lowercase().contains(needle)
            || self.formatted_tags().to_lowercase().contains(needle)
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Last source text read for this record, if any
    pub fn raw_source(&self) -> Option<&str> {
        self.raw_source.as_deref()
    }

    pub fn canonical_content(&self) -> &str {
        &self.canonical_content
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn pinned(&self) -> bool {
        self.pinned
    }

    pub fn rendered_content(&self) -> Option<&str> {
        self.rendered_content.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    /// Whether this record has a sidecar on disk
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }
}
