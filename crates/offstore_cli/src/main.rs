//! offstore CLI
//!
//! Command-line tools for offline media databases.
//!
//! # Commands
//!
//! - `list` - List stored manifests
//! - `inspect` - Display journal and store statistics
//! - `expire` - Change the expiration of a manifest
//! - `remove` - Remove a manifest and every segment it references
//! - `verify` - Check that every referenced segment exists

mod commands;

use clap::{Parser, Subcommand};
use offstore_core::DEFAULT_DATABASE_NAME;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// offstore command-line database tools.
#[derive(Parser)]
#[command(name = "offstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Database name inside the directory
    #[arg(global = true, short, long, default_value = DEFAULT_DATABASE_NAME)]
    name: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored manifests
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display journal and store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Change the expiration of a manifest
    Expire {
        /// Manifest key
        key: u64,

        /// New expiration in milliseconds since the epoch, or "never"
        expiration: String,
    },

    /// Remove a manifest and every segment it references
    Remove {
        /// Manifest key
        key: u64,
    },

    /// Check that every segment referenced by a manifest exists
    Verify,

    /// Show version information
    Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::List { format } => {
            let path = cli.path.ok_or("Database path required for list")?;
            commands::list::run(&path, &cli.name, &format).await?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, &cli.name, &format).await?;
        }
        Commands::Expire { key, expiration } => {
            let path = cli.path.ok_or("Database path required for expire")?;
            commands::expire::run(&path, &cli.name, key, &expiration).await?;
        }
        Commands::Remove { key } => {
            let path = cli.path.ok_or("Database path required for remove")?;
            commands::remove::run(&path, &cli.name, key).await?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Database path required for verify")?;
            commands::verify::run(&path, &cli.name).await?;
        }
        Commands::Version => {
            println!("offstore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("offstore Core v{}", offstore_core::VERSION);
        }
    }

    Ok(())
}
