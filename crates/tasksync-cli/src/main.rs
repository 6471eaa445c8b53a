//! tasksync CLI - inspect sync relationships and run cycles by hand

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tasksync_core::config::AdapterSettings;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::mappings::run_mappings;
use crate::commands::relationships::run_relationships;
use crate::commands::sync_once::run_sync_once;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tasksync=info".parse().expect("valid directive"))
                .add_directive("tasksync_core=warn".parse().expect("valid directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Relationships { json } => run_relationships(json, &db_path).await?,
        Commands::Mappings { tenant, json } => run_mappings(&tenant, json, &db_path).await?,
        Commands::SyncOnce {
            tenant,
            dry_run,
            json,
        } => {
            let settings = AdapterSettings::from_env()?;
            run_sync_once(&tenant, dry_run, json, &settings, &db_path).await?;
        }
    }

    Ok(())
}
