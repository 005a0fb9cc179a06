mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{create::CreateCommand, delete::DeleteCommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(
    name = "hangar",
    about = "Backup orchestration for managed servers",
    long_about = "Hangar creates backups of managed servers on local disk or S3 compatible storage, and deletes them again"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, env = "HANGAR_CONFIG", help = "Path to the configuration file")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,

    #[arg(short, long, help = "Enable quiet mode")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a backup of a server")]
    Create(CreateCommand),

    #[command(about = "Delete a local backup of a server")]
    Delete(DeleteCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet)?;

    debug!("Starting Hangar");

    match cli.command {
        Commands::Create(ref cmd) => cmd.run(&cli).await,
        Commands::Delete(ref cmd) => cmd.run(&cli).await,
    }
}

fn init_tracing(verbose: bool, quiet: bool) -> Result<()> {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hangar={}", level)));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
