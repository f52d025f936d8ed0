//! Slotwatch CLI: runs adapters and publishes one status per location.
//!
//! Usage:
//!   slotwatch run [--config path] [--replay file]... [--db path] [--dry-run] [--report path]
//!   slotwatch check-config --config path

use clap::{Parser, Subcommand};
use slotwatch::config::StoreConfig;
use slotwatch::logging::init_tracing;
use slotwatch::{Adapter, EngineConfig, ReplayAdapter, RunReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "slotwatch",
    version,
    about = "Appointment availability aggregation engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured adapter once and publish the results.
    ///
    /// Exits 0 on a clean run, 2 if any adapter or publish failed.
    Run {
        /// Path to YAML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the YES/LIMITED evidence threshold
        #[arg(long)]
        limited_threshold: Option<u32>,
        /// Log records instead of writing them
        #[arg(long)]
        dry_run: bool,
        /// Publish to a SQLite database at this path
        #[arg(long)]
        db: Option<PathBuf>,
        /// Additional signal fixture files to replay
        #[arg(long)]
        replay: Vec<PathBuf>,
        /// Write the run report as JSON ("-" for stdout)
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Validate a config file without running anything
    CheckConfig {
        /// Path to YAML config file
        #[arg(long)]
        config: PathBuf,
    },
}

/// Get the default database path (~/.local/share/slotwatch/status.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("slotwatch").join("status.db")
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::load(path)
            .map_err(|e| format!("failed to load config {}: {}", path.display(), e)),
        None => Ok(EngineConfig::default()),
    }
}

fn write_report(report: &RunReport, dest: &Path) -> Result<(), String> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| format!("failed to serialize report: {}", e))?;
    if dest == Path::new("-") {
        println!("{}", json);
        return Ok(());
    }
    std::fs::write(dest, json).map_err(|e| format!("failed to write {}: {}", dest.display(), e))
}

fn print_summary(report: &RunReport) {
    eprintln!(
        "run {}: {} keys, {} published, {} skipped, {} failed",
        report.run_id,
        report.statuses.len(),
        report.published().len(),
        report.skipped().len(),
        report.publish_failures().len()
    );
    for adapter in report.adapters.iter().filter(|a| a.state.is_failed()) {
        eprintln!("  adapter '{}' failed: {:?}", adapter.id, adapter.state);
    }
    for conflict in &report.conflicts {
        eprintln!(
            "  conflict on '{}': {:?} (kept {})",
            conflict.key, conflict.reported, conflict.kept
        );
    }
    for collision in &report.collisions {
        eprintln!(
            "  key collision '{}': '{}' vs '{}'",
            collision.key, collision.existing_address, collision.incoming_address
        );
    }
}

fn cmd_run(
    config: Option<PathBuf>,
    limited_threshold: Option<u32>,
    dry_run: bool,
    db: Option<PathBuf>,
    replay: Vec<PathBuf>,
    report: Option<PathBuf>,
) -> i32 {
    let mut engine_config = match load_config(config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if let Some(threshold) = limited_threshold {
        engine_config.limited_threshold = threshold;
    }
    if dry_run {
        engine_config.dry_run = true;
    }
    if let Some(path) = db {
        engine_config.store = StoreConfig::Sqlite { path: Some(path) };
    }
    if let Err(e) = engine_config.validate() {
        eprintln!("Error: {}", e);
        return 1;
    }

    if let Err(e) = init_tracing(&engine_config.logging) {
        eprintln!("Error: {}", e);
        return 1;
    }

    let store = match engine_config.store.open(&default_db_path()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to open store: {}", e);
            return 1;
        }
    };

    let mut adapters = engine_config.replay_adapters();
    for path in replay {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        adapters.push(Arc::new(ReplayAdapter::new(id, path)) as Arc<dyn Adapter>);
    }
    if adapters.is_empty() && engine_config.locations.is_empty() {
        eprintln!("Error: nothing to do (no adapters or locations configured)");
        return 1;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            return 1;
        }
    };
    let orchestrator = engine_config.orchestrator(store);
    let run_report = rt.block_on(orchestrator.run(&adapters));

    print_summary(&run_report);
    if let Some(dest) = report {
        if let Err(e) = write_report(&run_report, &dest) {
            eprintln!("Error: {}", e);
            return 1;
        }
    }

    if run_report.is_clean() {
        0
    } else {
        2
    }
}

fn cmd_check_config(path: &Path) -> i32 {
    let config = match load_config(Some(path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let store = match &config.store {
        StoreConfig::Memory => "memory".to_string(),
        StoreConfig::Sqlite { path } => format!(
            "sqlite ({})",
            path.clone().unwrap_or_else(default_db_path).display()
        ),
        StoreConfig::Http { url, .. } => format!("http ({})", url),
    };
    println!("Config OK: {}", path.display());
    println!("  limited_threshold: {}", config.limited_threshold);
    println!("  store:             {}", store);
    println!("  locations:         {}", config.locations.len());
    println!("  zip_counties:      {}", config.zip_counties.len());
    println!("  replay adapters:   {}", config.replay.len());
    0
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run {
            config,
            limited_threshold,
            dry_run,
            db,
            replay,
            report,
        } => cmd_run(config, limited_threshold, dry_run, db, replay, report),
        Commands::CheckConfig { config } => cmd_check_config(&config),
    };
    std::process::exit(code);
}
