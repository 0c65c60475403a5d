//! synesis-graph CLI: sync a compiled research corpus into a graph store.
//!
//! Usage:
//!   synesis-graph sync --project bundle.json [--config file] [--db path] [--replace] [--no-advanced]
//!   synesis-graph schema --project bundle.json
//!   synesis-graph stats [--db path]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use synesis_graph::config::{AdvancedMode, Config};
use synesis_graph::{resolve, AdvancedOutcome, GraphStore, OpenStore, Pipeline, ProjectBundle, SqliteStore};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "synesis-graph",
    version,
    about = "Project research corpora into a property graph with derived metrics"
)]
struct Cli {
    /// More log output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync a compiled project into the store and compute metrics
    Sync {
        /// Compiled project bundle (JSON or YAML)
        #[arg(long)]
        project: PathBuf,
        /// Configuration file (default: ./synesis-graph.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Path to SQLite database file, overriding the config
        #[arg(long)]
        db: Option<PathBuf>,
        /// Clear the store in the same transaction before applying
        #[arg(long)]
        replace: bool,
        /// Skip advanced metrics for this run
        #[arg(long)]
        no_advanced: bool,
    },
    /// Print the graph schema a project's template resolves to
    Schema {
        /// Compiled project bundle (JSON or YAML)
        #[arg(long)]
        project: PathBuf,
    },
    /// Print node and edge counts of a store
    Stats {
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
        /// Configuration file (default: ./synesis-graph.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>, db: Option<PathBuf>) -> Result<Config, String> {
    let mut config = Config::load(path).map_err(|e| e.to_string())?;
    if let Some(db) = db {
        config.store.path = db;
    }
    Ok(config)
}

fn open_store(path: &Path) -> Result<SqliteStore, String> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    }
    SqliteStore::open(path).map_err(|e| format!("Failed to open database: {}", e))
}

async fn cmd_sync(
    project: &Path,
    config: Option<&Path>,
    db: Option<PathBuf>,
    replace: bool,
    no_advanced: bool,
) -> Result<(), String> {
    let mut config = load_config(config, db)?;
    config.store.replace |= replace;
    if no_advanced {
        config.metrics.advanced = AdvancedMode::Disabled;
    }

    let bundle = ProjectBundle::load(project).map_err(|e| e.to_string())?;
    let store = open_store(&config.store.path)?;
    let report = Pipeline::from_config(Arc::new(store), &config)
        .run(&bundle)
        .await
        .map_err(|e| e.to_string())?;

    println!(
        "Synced '{}': {} records, {} nodes ({} new), {} relationships ({} new), run #{}",
        report.project,
        report.records,
        report.sync.commit.nodes_upserted,
        report.sync.commit.nodes_created,
        report.sync.commit.edges_merged,
        report.sync.commit.edges_created,
        report.sync.commit.run_id,
    );
    println!(
        "Native metrics: {} concepts, {} taxonomy nodes, {} sources",
        report.native.concepts, report.native.taxonomy, report.native.sources
    );
    match &report.advanced {
        AdvancedOutcome::Computed(r) => println!(
            "Advanced metrics ({}, {}): {} nodes, {} communities",
            r.strategy, r.engine, r.nodes, r.communities
        ),
        AdvancedOutcome::Unavailable(u) => eprintln!(
            "Warning: advanced metrics unavailable ({}): {}; missing {}",
            u.strategy,
            u.reason,
            u.missing.join(", ")
        ),
    }
    Ok(())
}

fn cmd_schema(project: &Path) -> Result<(), String> {
    let bundle = ProjectBundle::load(project).map_err(|e| e.to_string())?;
    let schema = resolve(&bundle.template).map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&schema).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

fn cmd_stats(config: Option<&Path>, db: Option<PathBuf>) -> Result<(), String> {
    let config = load_config(config, db)?;
    if !config.store.path.exists() {
        return Err(format!("no store at {}", config.store.path.display()));
    }
    let store = open_store(&config.store.path)?;
    let stats = store.stats().map_err(|e| e.to_string())?;

    println!("Nodes: {}", stats.node_count());
    for (label, count) in &stats.nodes_by_label {
        println!("  {label}: {count}");
    }
    println!("Relationships: {}", stats.edge_count());
    for (rel_type, count) in &stats.edges_by_type {
        println!("  {rel_type}: {count}");
    }
    if let Some(run) = stats.last_run {
        println!(
            "Last run: #{} '{}' at {}{}",
            run.id,
            run.project,
            run.committed_at.to_rfc3339(),
            if run.replaced { " (replace)" } else { "" }
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Sync {
            project,
            config,
            db,
            replace,
            no_advanced,
        } => cmd_sync(&project, config.as_deref(), db, replace, no_advanced).await,
        Commands::Schema { project } => cmd_schema(&project),
        Commands::Stats { db, config } => cmd_stats(config.as_deref(), db),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
