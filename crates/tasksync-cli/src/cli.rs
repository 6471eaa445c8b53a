use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tasksync")]
#[command(about = "Inspect and drive Notion <-> Google Tasks sync relationships")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the tasksync database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List sync relationships with their readiness and activity flags
    #[command(alias = "ls")]
    Relationships {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List identity mappings of one relationship
    Mappings {
        /// Relationship (tenant) id
        #[arg(long)]
        tenant: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a single sync cycle for one relationship
    SyncOnce {
        /// Relationship (tenant) id
        #[arg(long)]
        tenant: String,
        /// Only fetch and reconcile; print the plan without writing
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
