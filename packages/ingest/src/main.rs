#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the observation import tool.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use obs_sync_database::{db, parser_db};
use obs_sync_ingest::{RunOptions, all_parsers, progress::BarProgress, run_parser, run_scheduled};

#[derive(Parser)]
#[command(name = "obs_sync_ingest", about = "Observation record import tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single parser by name
    Run {
        /// Parser name (see `list`)
        name: String,
        /// Execute the full pipeline but withhold the final commit
        #[arg(long)]
        dry_run: bool,
        /// Maximum number of records to import (for testing)
        #[arg(long)]
        limit: Option<u64>,
    },
    /// List all registered parsers
    List,
    /// Show per-parser run bookkeeping
    History,
    /// Run every scheduled parser that is due
    RunScheduled {
        /// Comma-separated parser names (overrides `OBS_SYNC_PARSERS`)
        #[arg(long)]
        parsers: Option<String>,
    },
    /// Create the store schema
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => {
            let _conn = db::open_from_env()?;
            log::info!("Store schema is up to date.");
        }
        Commands::List => {
            println!("{:<28} {:<5} {:<9} DESCRIPTION", "NAME", "KIND", "SCHEDULE");
            println!("{}", "-".repeat(72));
            for def in all_parsers() {
                let schedule = def
                    .schedule_frequency
                    .map_or_else(|| "manual".to_string(), |days| format!("{days}d"));
                println!(
                    "{:<28} {:<5} {:<9} {}",
                    def.name,
                    def.kind(),
                    schedule,
                    def.description
                );
            }
        }
        Commands::History => {
            let conn = db::open_from_env()?;
            println!(
                "{:<28} {:<20} {:>10} {:>10}",
                "NAME", "LAST IMPORT", "LAST ROWS", "TOTAL"
            );
            println!("{}", "-".repeat(72));
            for record in parser_db::list(&conn)? {
                println!(
                    "{:<28} {:<20} {:>10} {:>10}",
                    record.name,
                    record
                        .last_import
                        .map_or_else(|| "never".to_string(), |dt| dt
                            .format("%Y-%m-%d %H:%M:%S")
                            .to_string()),
                    record
                        .nb_row_last_import
                        .map_or_else(|| "-".to_string(), |n| n.to_string()),
                    record.nb_row_total,
                );
            }
        }
        Commands::Run {
            name,
            dry_run,
            limit,
        } => {
            let def = obs_sync_source::registry::find_parser(&name)
                .ok_or_else(|| format!("Unknown parser: {name}"))?;
            let conn = db::open_from_env()?;
            let options = RunOptions {
                dry_run,
                limit,
                progress: Some(Arc::new(BarProgress::new(&name))),
            };
            let summary = run_parser(&conn, &def, &options).await?;
            println!(
                "{}: {} row(s) imported{}",
                summary.parser,
                summary.rows_imported,
                if summary.dry_run { " (dry run)" } else { "" }
            );
        }
        Commands::RunScheduled { parsers } => {
            let conn = db::open_from_env()?;
            let runs = run_scheduled(&conn, parsers).await?;
            log::info!("Scheduled sweep finished: {runs} parser(s) ran");
        }
    }

    Ok(())
}
