//! Command-line interface for folio.
//!
//! Thin driver over the library: list and search the catalog, inspect a
//! single record, collect orphaned sidecars, and keep the cache in sync with
//! a running watcher.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::MarkdownRenderer;
use crate::config::{self, paths};
use crate::ingest::WatchPipeline;
use crate::library::{Catalog, ContentRecord, Identity, SortKey};

/// folio - cached, searchable view over a directory of Markdown posts
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the catalog and list posts (pinned first)
    List {
        /// Only show posts whose content, title or tags contain this text
        #[arg(short, long)]
        query: Option<String>,

        /// Ordering within the pinned and unpinned groups
        /// (created-asc|oldest, created-desc|newest, modified-asc, modified-desc|updated)
        #[arg(short, long, default_value_t = SortKey::CreatedDesc)]
        sort: SortKey,

        /// Maximum number of posts to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show details of a single post
    Show {
        /// Post identity (file name without extension)
        identity: String,

        /// Print rendered output instead of canonical content
        #[arg(short, long)]
        rendered: bool,
    },

    /// Remove sidecars whose source file no longer exists
    Gc,

    /// Watch the source directory and keep the cache up to date
    Watch,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::List { query, sort, limit } => list_posts(query, sort, limit),
            Commands::Show { identity, rendered } => show_post(&identity, rendered),
            Commands::Gc => collect_orphans(),
            Commands::Watch => watch().await,
            Commands::Config => show_config(),
        }
    }
}

/// Build the catalog from the resolved configuration
fn open_catalog() -> Result<Arc<Catalog>> {
    let config = config::config()?;
    Ok(Arc::new(Catalog::new(
        config.catalog_config(),
        Arc::new(MarkdownRenderer::new()),
    )))
}

fn list_posts(query: Option<String>, sort: SortKey, limit: Option<usize>) -> Result<()> {
    let catalog = open_catalog()?;
    let records = catalog
        .rebuild(query.as_deref(), sort)
        .context("Failed to rebuild catalog")?;

    if records.is_empty() {
        println!("No posts found");
        return Ok(());
    }

    println!(
        "{:<3} {:<32} {:<20} {:<20} {}",
        "", "IDENTITY", "CREATED", "MODIFIED", "TAGS"
    );
    println!("{}", "-".repeat(95));

    let limit = limit.unwrap_or(records.len());
    for record in records.iter().take(limit) {
        print_row(record);
    }

    Ok(())
}

fn print_row(record: &ContentRecord) {
    let pin = if record.pinned() { "*" } else { "" };
    println!(
        "{:<3} {:<32} {:<20} {:<20} {}",
        pin,
        record.identity().as_str(),
        record.created_at().format("%Y-%m-%d %H:%M:%S"),
        record.modified_at().format("%Y-%m-%d %H:%M:%S"),
        record.formatted_tags()
    );
}

fn show_post(identity: &str, rendered: bool) -> Result<()> {
    let catalog = open_catalog()?;
    let record = catalog
        .get(&Identity::new(identity))
        .with_context(|| format!("Failed to load post: {}", identity))?;

    println!("Identity: {}", record.identity());
    println!("Title: {}", record.title());
    println!("Pinned: {}", record.pinned());
    if record.has_no_tags() {
        println!("Tags: (none)");
    } else {
        println!("Tags: {}", record.formatted_tags());
    }
    println!("Created: {}", record.created_at());
    println!("Modified: {}", record.modified_at());
    if let Some(fp) = record.fingerprint() {
        println!("Fingerprint: {}", fp);
    }
    println!("Sidecar: {}", paths::sidecar_file(identity)?.display());
    println!();

    if rendered {
        println!("{}", record.rendered_content().unwrap_or_default());
    } else {
        println!("{}", record.canonical_content());
    }

    Ok(())
}

fn collect_orphans() -> Result<()> {
    let catalog = open_catalog()?;
    let removed = catalog
        .reconcile_on_startup()
        .context("Failed to collect orphaned sidecars")?;

    if removed.is_empty() {
        println!("No orphaned sidecars");
    } else {
        for identity in &removed {
            println!("Removed {}", identity);
        }
        println!("\n{} sidecar(s) removed", removed.len());
    }

    Ok(())
}

async fn watch() -> Result<()> {
    let config = config::config()?;
    let catalog = open_catalog()?;

    let pipeline = WatchPipeline::with_config(Arc::clone(&catalog), config.watch.clone());
    pipeline.start()?;

    let outcome = async {
        let records = catalog.rebuild(None, SortKey::default())?;
        eprintln!(
            "Watching {} ({} posts). Press Ctrl-C to stop.",
            config.source.display(),
            records.len()
        );

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        Ok::<(), anyhow::Error>(())
    }
    .await;

    pipeline.stop().await?;
    outcome
}

fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("Home: {}", paths::folio_home()?.display());
    println!("Source: {}", paths::source_dir()?.display());
    println!("Sidecars: {}", paths::sidecar_dir()?.display());
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
    println!("Extension: {}", config.cache.extension);
    println!("Store rendered: {}", config.cache.store_rendered);
    println!("Missing sidecar policy: {:?}", config.cache.missing_sidecar);
    println!("Debounce: {}ms", config.watch.debounce_ms);

    Ok(())
}
