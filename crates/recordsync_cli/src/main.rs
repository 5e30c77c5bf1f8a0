//! RecordSync CLI
//!
//! Command-line tools for RecordSync state files.
//!
//! # Commands
//!
//! - `inspect` - Display persisted cursors and account identities
//! - `reset-cursor` - Discard a namespace's change cursor to force a full resync
//! - `forget-account` - Discard a namespace's stored account identity
//! - `demo` - Run a scripted two-device sync against an in-memory cloud

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// RecordSync command-line tools.
#[derive(Parser)]
#[command(name = "recordsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the sync state file
    #[arg(global = true, short, long)]
    state: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display persisted cursors and account identities
    Inspect {
        /// Only show this namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Discard the change cursor so the next pass fetches everything
    ResetCursor {
        /// Engine namespace, e.g. `recordsync.Note`
        #[arg(short, long)]
        namespace: String,

        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Discard the stored account identity
    ForgetAccount {
        /// Engine namespace, e.g. `recordsync.Note`
        #[arg(short, long)]
        namespace: String,
    },

    /// Run a scripted two-device sync against an in-memory cloud
    Demo {
        /// Number of notes the first device creates
        #[arg(short, long, default_value = "5")]
        notes: usize,

        /// Change-feed page size of the in-memory cloud
        #[arg(short, long, default_value = "2")]
        page_size: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { namespace, format } => {
            let path = cli.state.ok_or("State file path required for inspect")?;
            commands::inspect::run(&path, namespace.as_deref(), &format)?;
        }
        Commands::ResetCursor { namespace, dry_run } => {
            let path = cli.state.ok_or("State file path required for reset-cursor")?;
            commands::reset::reset_cursor(&path, &namespace, dry_run)?;
        }
        Commands::ForgetAccount { namespace } => {
            let path = cli.state.ok_or("State file path required for forget-account")?;
            commands::reset::forget_account(&path, &namespace)?;
        }
        Commands::Demo {
            notes,
            page_size,
            format,
        } => {
            commands::demo::run(notes, page_size, &format)?;
        }
        Commands::Version => {
            println!("RecordSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
