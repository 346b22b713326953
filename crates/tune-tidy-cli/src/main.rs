mod commands;
mod logging;
mod progress;
mod report;

use std::io::{self, Write};
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info};
use tune_tidy_core::execute::{self, ExecutorOptions};
use tune_tidy_core::plan::{self, PlanOptions};
use tune_tidy_core::storage::models::IntentStatus;
use tune_tidy_core::storage::Database;
use tune_tidy_core::{detect, resolve, AppConfig, IngestEngine};

fn main() -> Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let mut config = match tune_tidy_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    if let Some(db) = args.db {
        config.store_path = db;
    }

    let Some(command) = args.command else {
        Cli::command().print_long_help()?;
        return Ok(());
    };

    if let Err(err) = run(command, &config) {
        error!("Error: {:#}", err);
        process::exit(1);
    }
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<Database> {
    Database::open(&config.store_path)
        .with_context(|| format!("opening store at {}", config.store_path))
}

fn run(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Ingest => {
            let db = open_store(config)?;
            run_ingest(&db, config)?;
        }
        Commands::Detect { detector } => {
            let db = open_store(config)?;
            let reporter = CliReporter::new();
            let summaries = detector
                .detectors()
                .into_iter()
                .map(|d| detect::run_detector(&db, d, &reporter))
                .collect::<Result<Vec<_>, _>>()?;
            report::print_detectors(&summaries);
        }
        Commands::Resolve => {
            let db = open_store(config)?;
            let summary = resolve::resolve(&db)?;
            println!(
                "{} items with evidence, {} annotations changed",
                summary.items_with_evidence.to_string().cyan(),
                summary.updated.to_string().green(),
            );
        }
        Commands::Plan { dry_run } => {
            let db = open_store(config)?;
            let summary =
                plan::plan_duplicates(&db, &PlanOptions::from_config(&config.planner, dry_run))?;
            report::print_plan("Duplicate plan", &summary, dry_run);
        }
        Commands::PlanMigrations { dry_run } => {
            let db = open_store(config)?;
            if config.library_root.is_none() {
                info!("library_root is not configured; items carry no destination");
            }
            let summary = plan::plan_migrations(&db, dry_run)?;
            report::print_plan("Migration plan", &summary, dry_run);
        }
        Commands::PlanCleanup { dir, dry_run } => {
            let db = open_store(config)?;
            let summary =
                plan::plan_cleanup(&db, &dir, config.cleanup.max_image_bytes, dry_run)?;
            report::print_plan("Cleanup plan", &summary, dry_run);
        }
        Commands::Execute { dry_run, limit } => {
            let db = open_store(config)?;
            let reporter = CliReporter::new();
            let options = ExecutorOptions::from_config(config, dry_run, limit);
            let outcome = execute::execute(&db, &options, &reporter)?;
            report::print_execution(&outcome.summary, dry_run);
        }
        Commands::Process { dry_run } => {
            let db = open_store(config)?;
            run_ingest(&db, config)?;
            let reporter = CliReporter::new();
            let summaries = detect::run_all(&db, &reporter)?;
            report::print_detectors(&summaries);
            let resolved = resolve::resolve(&db)?;
            info!("{} annotations changed", resolved.updated);
            let summary =
                plan::plan_duplicates(&db, &PlanOptions::from_config(&config.planner, dry_run))?;
            report::print_plan("Duplicate plan", &summary, dry_run);
        }
        Commands::Retry { intent_id } => {
            let db = open_store(config)?;
            db.retry_intent(intent_id)?;
            println!("Intent {} is pending again", intent_id.to_string().green());
        }
        Commands::Errors => {
            let db = open_store(config)?;
            report::print_errors(&db.list_intents_with_status(IntentStatus::Error)?);
        }
        Commands::Summary => {
            let db = open_store(config)?;
            report::print_store_summary(&db.summary()?);
        }
        Commands::ExportIntents { path } => {
            let db = open_store(config)?;
            let written = report::write_intents_to_csv(&db.list_intents()?, &path)?;
            println!("{} intents written to {}", written, path.display());
        }
        Commands::PrintConfig => {
            println!("{}", toml::to_string_pretty(config)?);
        }
        Commands::TruncateDb => {
            if prompt_confirm(
                "Are you SURE you want to COMPLETELY DELETE the Database?",
                Some(false),
            )? {
                open_store(config)?.truncate_all()?;
                println!("All tables truncated");
            }
        }
    }
    Ok(())
}

fn run_ingest(db: &Database, config: &AppConfig) -> Result<()> {
    let engine = IngestEngine::new(config.clone());
    let reporter = CliReporter::new();
    let summary = engine.ingest(db, &reporter)?;
    report::print_ingest(&summary);
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
