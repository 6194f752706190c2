//! cqlsync command line.
//!
//! - `reconcile`: one sweep over the manifest, optionally writing back
//!   late-initialised fields, external names and status
//! - `observe`: report existence and drift without issuing statements

use clap::{Parser, Subcommand};
use cqlsync_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "cqlsync", about = "Converge a Cassandra cluster to a declared manifest")]
struct Cli {
    /// Debug logging, with the duration of every statement
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Also append logs to <DIR>/cqlsync.log
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one reconciliation pass for every resource in the manifest
    Reconcile {
        /// Manifest describing the connection and desired resources
        #[arg(short, long)]
        manifest: PathBuf,

        /// Rewrite the manifest with late-initialised fields, external names and status
        #[arg(long)]
        write_back: bool,

        /// Directory for connection secrets of newly created roles
        #[arg(long, value_name = "DIR")]
        secrets_dir: Option<PathBuf>,
    },

    /// Report whether each resource exists and is up to date
    Observe {
        /// Manifest describing the connection and desired resources
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LogConfig {
        app_name: "cqlsync",
        verbose: cli.verbose,
        log_dir: cli.log_dir.as_deref(),
    }) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Reconcile {
            manifest,
            write_back,
            secrets_dir,
        } => {
            cli::reconcile::run(cli::reconcile::ReconcileArgs {
                manifest,
                write_back,
                secrets_dir,
            })
            .await
        }
        Commands::Observe { manifest } => cli::observe::run(&manifest).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
