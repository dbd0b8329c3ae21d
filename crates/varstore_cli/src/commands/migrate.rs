//! Migrate command implementation.

use super::{CommandResult, Context};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use varstore_core::{MigrationConfig, MigrationPipeline, MigrationReport};

/// Builds the migration settings from the configuration and flags.
pub fn settings(
    ctx: &Context,
    source: Option<PathBuf>,
    table: Option<String>,
    rate: Option<u32>,
) -> MigrationConfig {
    let mut config = ctx.config.migration.clone().enabled(true);
    if let Some(source) = source {
        config = config.source_dir(source);
    }
    if let Some(table) = table {
        config = config.target_table(table);
    }
    if let Some(rate) = rate {
        config = config.keys_per_second((rate > 0).then_some(rate));
    }
    config
}

/// Runs the migrate command.
///
/// Ctrl-C stops the run after the current key.
pub async fn run(
    ctx: &Context,
    source: Option<PathBuf>,
    table: Option<String>,
    rate: Option<u32>,
    dry_run: bool,
) -> CommandResult {
    let config = settings(ctx, source, table, rate);
    let pipeline = MigrationPipeline::new(ctx.engine.clone(), config)?;

    if dry_run {
        let (files, report) = pipeline.plan().await?;
        println!("Migration Plan");
        println!("==============");
        println!("  Source: {}", pipeline.config().source_dir.display());
        for file in &files {
            println!(
                "  {} -> {} ({} keys)",
                file.path.display(),
                file.table,
                file.entries.len()
            );
        }
        println!("  Total keys: {}", report.total_keys);
        for issue in &report.failed_files {
            println!("  Skipped file: {} ({})", issue.file.display(), issue.reason);
        }
        println!("\nDry run - no changes made");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; stopping migration");
            on_interrupt.cancel();
        }
    });

    let report = pipeline.run(&cancel).await?;
    print_report(&report);
    if !report.is_complete() {
        info!("some keys were not migrated; see warnings above");
    }
    Ok(())
}

fn print_report(report: &MigrationReport) {
    println!("Migration Summary");
    println!("=================");
    println!("  Total keys:   {}", report.total_keys);
    println!("  Migrated:     {}", report.migrated);
    println!("  Skipped:      {}", report.skipped.len());
    println!("  Failed:       {}", report.failed.len());
    println!("  Failed files: {}", report.failed_files.len());
    println!("  Elapsed:      {:.1}s", report.elapsed.as_secs_f64());
    if report.cancelled {
        println!("  Cancelled before completion");
    }
}
