//! Command-line interface for paperflow.
//!
//! Provides commands for managing documents, running the analysis
//! pipeline, checking per-stage status and clearing cached results.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use crate::adapters::{Collaborators, FileDocumentSource, HttpCollaborator};
use crate::config::{self, ResolvedConfig};
use crate::core::{prerequisites_of, FileCache, Orchestrator, StageCache, STAGE_ORDER};
use crate::domain::{
    Document, DocumentId, PipelineSnapshot, RunOutcome, Stage, StageEventKind, StageResult,
};
use crate::library::{load_sample, DocumentCatalog};

/// paperflow - Staged document analysis pipeline
#[derive(Parser, Debug)]
#[command(name = "paperflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the stage dependency graph
    Stages,

    /// Manage the document catalog
    Docs {
        #[command(subcommand)]
        command: DocsCommands,
    },

    /// Run the pipeline for a document
    Run {
        /// Document ID
        document_id: String,

        /// Re-run this stage and every later one
        #[arg(long)]
        from: Option<Stage>,
    },

    /// Show the cached state of every stage
    Status {
        /// Document ID
        document_id: String,
    },

    /// Manage cached stage results
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum DocsCommands {
    /// Add a document file (or a sample bundle with --sample)
    Add {
        /// Path to the document, or to a sample JSON file
        path: PathBuf,

        /// Display name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,

        /// Treat the file as a sample bundle
        #[arg(long)]
        sample: bool,
    },

    /// List known documents
    List,

    /// Remove a document from the catalog
    Remove {
        /// Document ID
        document_id: String,

        /// Also delete its cached stage results
        #[arg(long)]
        purge: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Delete every cached stage result of a document
    Clear {
        /// Document ID
        document_id: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Stages => show_stages(),
            Commands::Docs { command } => match command {
                DocsCommands::Add { path, name, sample } => add_document(&path, name, sample).await,
                DocsCommands::List => list_documents().await,
                DocsCommands::Remove { document_id, purge } => {
                    remove_document(&document_id, purge).await
                }
            },
            Commands::Run { document_id, from } => run_document(&document_id, from).await,
            Commands::Status { document_id } => show_status(&document_id).await,
            Commands::Cache { command } => match command {
                CacheCommands::Clear { document_id } => clear_cache(&document_id).await,
            },
            Commands::Config => show_config(),
        }
    }
}

/// Build an orchestrator wired to the configured service and cache
fn build_orchestrator(config: &ResolvedConfig) -> Orchestrator {
    let mut http = HttpCollaborator::new(&config.service.base_url, config.service.token.clone());
    for (stage, path) in &config.service.endpoints {
        http = http.with_endpoint(*stage, path.clone());
    }

    let collaborators =
        Collaborators::new(Arc::new(FileDocumentSource::new())).with_all(Arc::new(http));
    let cache = StageCache::new(Arc::new(FileCache::new(&config.cache_dir)));

    Orchestrator::new(collaborators, cache, config.timeouts.clone())
}

async fn find_document(document_id: &str) -> Result<Document> {
    let catalog = DocumentCatalog::load_default().await?;
    catalog
        .get(&DocumentId::new(document_id))
        .cloned()
        .with_context(|| format!("Document not found: {}", document_id))
}

fn show_stages() -> Result<()> {
    println!("{:<4} {:<16} {:<40}", "#", "STAGE", "REQUIRES");
    println!("{}", "-".repeat(60));

    for stage in STAGE_ORDER {
        let prereqs: Vec<&str> = prerequisites_of(stage).iter().map(Stage::as_str).collect();
        let requires = if prereqs.is_empty() {
            "-".to_string()
        } else {
            prereqs.join(", ")
        };
        println!("{:<4} {:<16} {:<40}", stage.index() + 1, stage.as_str(), requires);
    }

    Ok(())
}

async fn add_document(path: &Path, name: Option<String>, sample: bool) -> Result<()> {
    let mut catalog = DocumentCatalog::load_default().await?;

    let document = if sample {
        let mut document = load_sample(path).await?;
        if let Some(name) = name {
            document.name = name;
        }
        document
    } else {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("Document not found: {}", path.display()))?;
        let name = name.unwrap_or_else(|| {
            absolute
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| absolute.display().to_string())
        });
        Document::live(name, absolute.display().to_string())
    };

    eprintln!("Added {} ({})", document.name, document.id);
    println!("{}", document.id);
    catalog.add(document);
    catalog.save().await
}

async fn list_documents() -> Result<()> {
    let catalog = DocumentCatalog::load_default().await?;

    if catalog.is_empty() {
        println!("No documents. Use 'paperflow docs add <path>' to add one.");
        return Ok(());
    }

    println!("{:<38} {:<8} {:<40}", "ID", "KIND", "NAME");
    println!("{}", "-".repeat(86));
    for document in catalog.list() {
        let kind = if document.is_sample() { "sample" } else { "live" };
        println!("{:<38} {:<8} {:<40}", document.id, kind, document.name);
    }
    println!("\nTotal: {} documents", catalog.len());

    Ok(())
}

async fn remove_document(document_id: &str, purge: bool) -> Result<()> {
    let mut catalog = DocumentCatalog::load_default().await?;
    let id = DocumentId::new(document_id);

    if catalog.remove(&id).is_none() {
        bail!("Document not found: {}", document_id);
    }
    catalog.save().await?;

    if purge {
        let cache = FileCache::new(config::cache_dir()?);
        cache
            .remove_document(&id)
            .await
            .with_context(|| format!("Failed to purge cache for {}", document_id))?;
    }

    eprintln!("Removed {}", document_id);
    Ok(())
}

async fn run_document(document_id: &str, from: Option<Stage>) -> Result<()> {
    let config = config::config()?;
    let document = find_document(document_id).await?;
    let orchestrator = build_orchestrator(config);

    let mut events = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let marker = match event.kind {
                        StageEventKind::StageCompleted | StageEventKind::StageHydrated => "ok",
                        StageEventKind::StageSkipped => "--",
                        StageEventKind::StageFailed | StageEventKind::RunFailed => "!!",
                        StageEventKind::StageStarted => "..",
                        _ => "  ",
                    };
                    match event.duration_ms {
                        Some(ms) => eprintln!("[{}] {} ({} ms)", marker, event.summary, ms),
                        None => eprintln!("[{}] {}", marker, event.summary),
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome = orchestrator.start(&document, from).await;
    drop(orchestrator);
    let _ = printer.await;

    match &outcome {
        RunOutcome::Completed => eprintln!("\n[{} completed]", document.name),
        RunOutcome::Seeded => eprintln!("\n[{} seeded from sample data]", document.name),
        RunOutcome::Failed {
            stage,
            kind,
            message,
        } => {
            eprintln!("\n[{} failed at {} ({}): {}]", document.name, stage, kind, message);
            eprintln!("Retry with: paperflow run {} --from {}", document.id, stage);
        }
        RunOutcome::Halted { stage, waiting_on } => {
            eprintln!(
                "\n[{} stopped before {}: waiting on {:?}]",
                document.name, stage, waiting_on
            );
        }
        RunOutcome::Cancelled => eprintln!("\n[{} cancelled]", document.name),
    }

    Ok(())
}

async fn show_status(document_id: &str) -> Result<()> {
    let config = config::config()?;
    let document = find_document(document_id).await?;
    let orchestrator = build_orchestrator(config);

    if let Some(bundle) = document.sample_bundle() {
        println!(
            "Sample document, {} stages bundled",
            Stage::ALL.len() - bundle.missing_stages().len()
        );
    }
    orchestrator.hydrate(&document.id).await;
    print_snapshot(&document, &orchestrator.snapshot(&document.id));

    Ok(())
}

fn print_snapshot(document: &Document, snapshot: &PipelineSnapshot) {
    println!("Document: {} ({})", document.name, document.id);
    println!("State: {:?}", snapshot.state());
    println!();
    println!("{:<16} {:<9} {:<50}", "STAGE", "STATUS", "DETAIL");
    println!("{}", "-".repeat(76));

    for stage in STAGE_ORDER {
        let (status, detail) = match snapshot.result(stage) {
            StageResult::Idle => ("idle", String::new()),
            StageResult::Loading { started_at } => ("loading", format!("since {}", started_at)),
            StageResult::Success { payload, .. } => ("success", payload.summary()),
            StageResult::Error { message, .. } => ("error", message.clone()),
        };
        println!("{:<16} {:<9} {:<50}", stage.as_str(), status, detail);
    }
}

async fn clear_cache(document_id: &str) -> Result<()> {
    let cache = FileCache::new(config::cache_dir()?);
    cache
        .remove_document(&DocumentId::new(document_id))
        .await
        .with_context(|| format!("Failed to clear cache for {}", document_id))?;

    eprintln!("Cleared cached results for {}", document_id);
    Ok(())
}

fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("paperflow configuration");
    println!();
    match &config.config_file {
        Some(path) => println!("  Config file:  {}", path.display()),
        None => println!("  Config file:  (none, using defaults)"),
    }
    println!("  Home:         {}", config.home.display());
    println!("  Cache:        {}", config.cache_dir.display());
    println!("  Service:      {}", config.service.base_url);
    println!(
        "  Token:        {}",
        if config.service.token.is_some() { "set" } else { "not set" }
    );
    println!("  Timeouts:");
    for (stage, bound) in config.timeouts.all() {
        println!("    {:<16} {}s", stage.as_str(), bound.as_secs());
    }

    Ok(())
}
