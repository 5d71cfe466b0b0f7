//! CLI binary for the code intelligence engine: index a repository into its
//! content-addressed knowledge graph and query the result.

use anyhow::{Context, Result};
use cie_core::config::CieConfig;
use cie_pipeline::{IngestionResult, Phase, Pipeline, RunMode};
use cie_store::GraphStore;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Parser)]
#[command(name = "cie", about = "Content-addressed code knowledge graph with semantic search")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the repository (incremental when stored state allows)
    Index {
        /// Ignore stored state and re-index from scratch
        #[arg(long)]
        force: bool,
    },

    /// Show the last ingestion summary and the indexed reference
    Status,

    /// Run a raw datalog read query against the store
    Query {
        /// Query string, e.g. '?[name] := *cie_function{name}'
        query: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let project_root = match &cli.project {
        Some(p) => p.clone(),
        None => std::env::current_dir().context("failed to get current directory")?,
    };

    match cli.command {
        Commands::Index { force } => cmd_index(&project_root, force),
        Commands::Status => cmd_status(&project_root),
        Commands::Query { query } => cmd_query(&project_root, &query),
    }
}

fn open_store(project_root: &Path, config: &CieConfig) -> Result<GraphStore> {
    GraphStore::open(&project_root.join(&config.store_path))
        .with_context(|| format!("failed to open store at {}", config.store_path))
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Load => "loading",
        Phase::Parse => "parsing",
        Phase::Resolve => "resolving",
        Phase::Embed => "embedding",
        Phase::Write => "writing",
    }
}

/// One progress bar at a time, swapped out when the pipeline moves to the
/// next phase.
fn progress_reporter() -> Box<dyn Fn(Phase, u64, u64) + Send + Sync> {
    let state: Mutex<Option<(Phase, ProgressBar)>> = Mutex::new(None);
    Box::new(move |phase, done, total| {
        let Ok(mut guard) = state.lock() else { return };
        let needs_new = !matches!(&*guard, Some((current, _)) if *current == phase);
        if needs_new {
            if let Some((_, bar)) = guard.take() {
                bar.finish_and_clear();
            }
            let bar = ProgressBar::new(total).with_style(
                ProgressStyle::with_template("{msg:>9} [{bar:40}] {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_message(phase_label(phase));
            *guard = Some((phase, bar));
        }
        if let Some((_, bar)) = &*guard {
            bar.set_length(total);
            bar.set_position(done);
            if done >= total {
                bar.finish_and_clear();
            }
        }
    })
}

fn cmd_index(project_root: &Path, force: bool) -> Result<()> {
    let mut config = CieConfig::load(project_root)?;
    config.force_reindex = config.force_reindex || force;

    let store = open_store(project_root, &config)?;
    let provider = cie_embed::provider_from_config(&config)
        .context("failed to construct the embedding provider")?;

    eprintln!("Indexing {} ...", project_root.display());
    let pipeline =
        Pipeline::new(config, store, provider).with_progress(progress_reporter());
    let result = pipeline.run(project_root)?;

    print_summary(&result);
    Ok(())
}

fn print_summary(result: &IngestionResult) {
    let mode = match result.mode {
        RunMode::Full => "full",
        RunMode::Incremental => "incremental",
    };
    eprintln!("\nIndex complete ({mode} run).");
    if let Some(delta) = &result.delta {
        eprintln!(
            "  Delta: +{} ~{} -{} renamed {}",
            delta.added, delta.modified, delta.deleted, delta.renamed
        );
    }
    eprintln!("  Files: {}", result.files_processed);
    eprintln!("  Functions: {}", result.functions_extracted);
    eprintln!("  Types: {}", result.types_extracted);
    eprintln!("  Fields: {}", result.fields_extracted);
    eprintln!("  Imports: {}", result.imports_extracted);
    eprintln!(
        "  Edges: {} defines, {} defines_type, {} calls, {} implements",
        result.defines_edges,
        result.defines_type_edges,
        result.calls_edges,
        result.implements_edges
    );
    if !result.skipped.is_empty() {
        let skips: Vec<String> = result
            .skipped
            .iter()
            .map(|(reason, count)| format!("{reason} {count}"))
            .collect();
        eprintln!("  Skipped: {}", skips.join(", "));
    }
    if result.parse_errors > 0 {
        eprintln!("  Parse errors: {}", result.parse_errors);
    }
    if result.embedding_errors > 0 {
        eprintln!("  Embedding errors: {}", result.embedding_errors);
    }
    if result.code_text_truncated > 0 {
        eprintln!("  Code texts truncated: {}", result.code_text_truncated);
    }
    let t = &result.timings;
    eprintln!(
        "  Timings: load {}ms, parse {}ms, resolve {}ms, embed {}ms, write {}ms",
        t.load_ms, t.parse_ms, t.resolve_ms, t.embed_ms, t.write_ms
    );
    if let Some(commit) = &result.last_indexed_ref {
        eprintln!("  Indexed ref: {}", &commit[..12.min(commit.len())]);
    }
}

fn cmd_status(project_root: &Path) -> Result<()> {
    let config = CieConfig::load(project_root)?;
    let store_file = project_root.join(&config.store_path);
    if !store_file.exists() {
        eprintln!("No index found. Run `cie index` first.");
        return Ok(());
    }
    let store = open_store(project_root, &config)?;

    match store.get_project_meta(cie_store::schema::LAST_RUN_KEY)? {
        Some(json) => {
            let result: IngestionResult =
                serde_json::from_str(&json).context("stored run summary is unreadable")?;
            println!("Project: {}", result.project_id);
            println!("Last run: {} ({:?})", result.run_id, result.mode);
            println!("Files: {}", result.files_processed);
            println!("Functions: {}", result.functions_extracted);
            println!("Types: {}", result.types_extracted);
            println!(
                "Edges: {} defines, {} defines_type, {} calls, {} implements",
                result.defines_edges,
                result.defines_type_edges,
                result.calls_edges,
                result.implements_edges
            );
            if result.parse_errors > 0 {
                println!("Parse errors: {}", result.parse_errors);
            }
        }
        None => eprintln!("No completed run recorded yet."),
    }

    match store.last_indexed_ref()? {
        Some(commit) => println!("Indexed ref: {commit}"),
        None => println!("Indexed ref: (none)"),
    }
    Ok(())
}

fn cmd_query(project_root: &Path, query: &str) -> Result<()> {
    let config = CieConfig::load(project_root)?;
    let store = open_store(project_root, &config)?;
    let out = store.query(query).context("query failed")?;

    println!("{}", out.headers.join("\t"));
    for row in &out.rows {
        println!("{}", row.join("\t"));
    }
    eprintln!("({} rows)", out.rows.len());
    Ok(())
}
