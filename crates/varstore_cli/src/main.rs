//! VarStore CLI
//!
//! Command-line tools for VarStore data management.
//!
//! # Commands
//!
//! - `migrate` - Import a legacy file dump
//! - `inspect` - Display tables, variables and record counts
//! - `clean` - Sweep expired records now
//! - `ping` - Check that the store answers
//! - `drop` - Drop a table or one variable of it

mod commands;

use clap::{Parser, Subcommand};
use commands::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// VarStore command-line tools.
#[derive(Parser)]
#[command(name = "varstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store URL (memory://, file://<dir> or a directory path)
    #[arg(global = true, short, long)]
    url: Option<String>,

    /// JSON configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a legacy file dump
    Migrate {
        /// Dump root directory
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Write every record to this table instead of the file stem
        #[arg(short, long)]
        table: Option<String>,

        /// Keys written per second (0 = unlimited)
        #[arg(short, long)]
        rate: Option<u32>,

        /// Parse and count without writing
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Display tables, variables and record counts
    Inspect {
        /// Only this table
        #[arg(short, long)]
        table: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove expired records now
    Clean {
        /// Namespace to sweep (defaults to the reserved namespace)
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Check that the store answers
    Ping,

    /// Drop a table, or one variable of it
    Drop {
        /// Table to drop from
        table: String,

        /// Variable to drop; the whole table when omitted
        variable: Option<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("VarStore CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let ctx = Context::open(cli.url.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Commands::Migrate {
            source,
            table,
            rate,
            dry_run,
        } => commands::migrate::run(&ctx, source, table, rate, dry_run).await?,
        Commands::Inspect { table, format } => {
            commands::inspect::run(&ctx, table.as_deref(), &format).await?;
        }
        Commands::Clean { namespace } => {
            commands::maintenance::clean(&ctx, namespace.as_deref()).await?;
        }
        Commands::Ping => commands::maintenance::ping(&ctx).await?,
        Commands::Drop { table, variable } => {
            commands::maintenance::drop(&ctx, &table, variable.as_deref()).await?;
        }
        Commands::Version => {}
    }

    Ok(())
}
