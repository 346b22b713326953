use anyhow::Result;
use colored::*;
use csv::Writer;
use std::path::Path;
use tune_tidy_core::storage::models::{ActionIntent, StoreSummary};
use tune_tidy_core::{DetectorSummary, ExecutionSummary, IngestSummary, PlanSummary};

pub fn write_intents_to_csv(intents: &[ActionIntent], file_path: &Path) -> Result<usize> {
    let mut writer = Writer::from_path(file_path)?;

    writer.write_record([
        "id",
        "item_id",
        "kind",
        "status",
        "src_path",
        "dst_path",
        "error_detail",
        "created_at",
        "applied_at",
    ])?;

    for intent in intents {
        writer.write_record(&[
            intent.id.to_string(),
            intent.item_id.map_or(String::new(), |id| id.to_string()),
            intent.kind.to_string(),
            intent.status.to_string(),
            intent.src_path.clone(),
            intent.dst_path.clone().unwrap_or_default(),
            intent.error_detail.clone().unwrap_or_default(),
            intent.created_at.clone(),
            intent.applied_at.clone().unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(intents.len())
}

pub fn print_ingest(summary: &IngestSummary) {
    println!();
    println!(
        "Discover: {}, Extract: {}, DB: {}",
        format!("{:.2}s", summary.discover_duration.as_secs_f64()).green(),
        format!("{:.2}s", summary.extract_duration.as_secs_f64()).green(),
        format!("{:.2}s", summary.db_write_duration.as_secs_f64()).green(),
    );
    println!(
        "{} discovered, {} new, {} updated, {} unchanged, {} fingerprinted, {} without digest",
        summary.discovered.to_string().cyan(),
        summary.inserted.to_string().green(),
        summary.updated.to_string().yellow(),
        summary.unchanged,
        summary.fingerprinted,
        summary.digest_failures.to_string().red(),
    );
}

pub fn print_detectors(summaries: &[DetectorSummary]) {
    for s in summaries {
        println!(
            "{:<12} {} examined, {} new edges, {} skipped",
            s.detector.to_string().bold(),
            s.examined,
            s.new_edges.to_string().green(),
            s.skipped.to_string().yellow(),
        );
    }
}

pub fn print_plan(label: &str, summary: &PlanSummary, dry_run: bool) {
    println!(
        "{}{}: {} considered, {} queued, {} rejected, {} already planned",
        if dry_run { "[dry-run] ".yellow().to_string() } else { String::new() },
        label.bold(),
        summary.considered,
        summary.queued.to_string().green(),
        summary.rejected.to_string().yellow(),
        summary.already_planned,
    );
}

pub fn print_execution(summary: &ExecutionSummary, dry_run: bool) {
    println!(
        "{}{} processed: {} migrated, {} archived, {} removed, {} skipped, {} errors, {} recovered",
        if dry_run { "[dry-run] ".yellow().to_string() } else { String::new() },
        summary.processed.to_string().cyan(),
        summary.migrated.to_string().green(),
        summary.archived.to_string().green(),
        summary.removed.to_string().green(),
        summary.skipped,
        summary.errored.to_string().red(),
        summary.recovered.to_string().yellow(),
    );
}

pub fn print_store_summary(summary: &StoreSummary) {
    println!("{}", "Items".bold());
    for (status, count) in &summary.items {
        println!("  {:<22} {}", status, count);
    }
    println!("{}", "Evidence".bold());
    for (reason, count) in &summary.evidence {
        println!("  {:<22} {}", reason, count);
    }
    println!("{}", "Intents".bold());
    for (status, count) in &summary.intents {
        println!("  {:<22} {}", status, count);
    }
}

pub fn print_errors(intents: &[ActionIntent]) {
    if intents.is_empty() {
        println!("{}", "No errored intents".green());
        return;
    }
    for intent in intents {
        println!(
            "{} {} {} {}",
            format!("#{}", intent.id).bold(),
            intent.kind,
            intent.src_path,
            intent.error_detail.as_deref().unwrap_or("").red(),
        );
    }
}
