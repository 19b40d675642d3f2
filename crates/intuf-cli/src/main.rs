//! # intuf CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use intuf_cli::delete::{run_delete, DeleteArgs};
use intuf_cli::download::{run_download, DownloadArgs};
use intuf_cli::upload::{run_upload, run_upload_layout, UploadArgs, UploadLayoutArgs};
use intuf_cli::verbosity_filter;

/// Attestation-gated client for a TUF-backed target repository.
///
/// Downloads are installed only after in-toto verification of the target's
/// attached layout, keys and links.
#[derive(Parser, Debug)]
#[command(name = "intuf", version, about, long_about = None)]
struct Cli {
    /// Verbose output. Repeat for more (-v warn, -vv info, -vvv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download, verify and install a target.
    Download(DownloadArgs),

    /// Publish an artifact with its layout, key and links.
    Upload(UploadArgs),

    /// Publish a layout with its keys.
    UploadLayout(UploadLayoutArgs),

    /// Remove targets from the repository index.
    Delete(DeleteArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::new(verbosity_filter(cli.verbose));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!("intuf {} starting", env!("CARGO_PKG_VERSION"));

    let result = match &cli.command {
        Commands::Download(args) => run_download(args).await,
        Commands::Upload(args) => run_upload(args).await,
        Commands::UploadLayout(args) => run_upload_layout(args).await,
        Commands::Delete(args) => run_delete(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
