//! Administrative CLI for the file identity store
//!
//! Usage:
//!   fid drop
//!   fid drop --db-path /path/to/file_id_manager.db

use clap::{Parser, Subcommand};
use file_identity::{config, database};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fid")]
#[command(about = "File identity store administration", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop the file ID table from the backing store
    Drop {
        /// Store file to operate on; defaults to the user data dir store
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Drop { db_path } => {
            let db_path = match db_path {
                Some(path) => path,
                None => config::default_db_path()?,
            };
            database::drop_files_table(&db_path).await?;
            println!(
                "Successfully dropped file ID table at path {}",
                db_path.display()
            );
        }
    }

    Ok(())
}
