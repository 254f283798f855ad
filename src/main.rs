//! Gradebook CLI - class-manager record exporter.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gradebook::auth::{CredentialStore, SessionManager};
use gradebook::pipeline::{ExportConfig, Exporter, PresetSelector, RecordSelector};
use gradebook::ui::{self, TerminalPrompter, TerminalSelector};
use gradebook::HttpGateway;

/// Gradebook CLI - export class-manager records to spreadsheets.
#[derive(Parser)]
#[command(name = "gradebook")]
#[command(about = "Class-manager record exporter")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in (if needed), pick a record and export it
    Export {
        /// Output directory for workbooks
        #[arg(long, default_value = ".")]
        output: PathBuf,

        /// Credential cache file
        #[arg(long, default_value = ".credentials.json")]
        credentials: PathBuf,

        /// Record to export without prompting (1-indexed; 0 = every
        /// class roster)
        #[arg(long)]
        pick: Option<usize>,

        /// Record-list page size
        #[arg(long, default_value = "20")]
        page_size: u32,
    },

    /// Run the QR login flow now, ignoring any cached session
    Login {
        /// Credential cache file
        #[arg(long, default_value = ".credentials.json")]
        credentials: PathBuf,
    },

    /// Drop the cached session
    Logout {
        /// Credential cache file
        #[arg(long, default_value = ".credentials.json")]
        credentials: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("gradebook=debug,info")
    } else {
        EnvFilter::new("gradebook=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Export {
            output,
            credentials,
            pick,
            page_size,
        } => {
            tracing::info!(
                output = %output.display(),
                credentials = %credentials.display(),
                ?pick,
                page_size,
                "Starting export"
            );
            run_export(output, credentials, pick, page_size).await
        }
        Commands::Login { credentials } => run_login(credentials).await,
        Commands::Logout { credentials } => run_logout(credentials),
    }
}

async fn run_export(
    output: PathBuf,
    credentials: PathBuf,
    pick: Option<usize>,
    page_size: u32,
) -> Result<()> {
    let config = ExportConfig {
        output_dir: output,
        credentials_path: credentials,
        page_size,
    };

    let gateway = HttpGateway::new()?;
    let exporter = Exporter::new(config, Arc::new(gateway));

    let preset = pick.map(PresetSelector);
    let selector: &dyn RecordSelector = match &preset {
        Some(preset) => preset,
        None => &TerminalSelector,
    };

    let summary = exporter.run(&TerminalPrompter, selector).await?;

    println!("\n📊 Export Summary");
    println!("   Exported: {}", summary.exported);
    println!("   Skipped: {}", summary.skipped);
    for path in &summary.paths {
        println!("   → {}", path.display());
    }

    if !summary.errors.is_empty() {
        println!("   Errors: {}", summary.errors.len());
        for err in &summary.errors {
            eprintln!("     - {err}");
        }
    }

    if summary.exported > 0 {
        ui::print_success("Export complete");
    } else if summary.errors.is_empty() {
        ui::print_warning("Nothing was exported");
    }

    Ok(())
}

async fn run_login(credentials: PathBuf) -> Result<()> {
    let gateway = HttpGateway::new()?;
    let store = CredentialStore::new(credentials);
    let mut manager = SessionManager::new(store.clone());

    manager.force_login(&gateway, &TerminalPrompter).await?;
    ui::print_success(&format!("Session saved to {}", store.path().display()));

    Ok(())
}

fn run_logout(credentials: PathBuf) -> Result<()> {
    let store = CredentialStore::new(credentials);
    store.clear()?;
    ui::print_success("Cached session removed");
    Ok(())
}
