//! Command line interface definition

use clap::{Parser, Subcommand};
use sempool_types::Priority;
use std::path::PathBuf;

/// sempool - priority gates for shared resources
#[derive(Parser)]
#[command(name = "sempool")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and exercise rate-limited resource gates")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// List registered resources and their tier permits
    #[command(alias = "ls")]
    Gates,

    /// Run sleeping tasks through a gate and report the observed concurrency
    #[command(alias = "sim")]
    Simulate {
        /// Resource to dispatch against
        #[arg(short, long)]
        resource: String,

        /// Number of tasks to dispatch
        #[arg(short, long, default_value_t = 10)]
        tasks: usize,

        /// How long each task holds its permit, in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 100)]
        hold_ms: u64,

        /// Priority of every dispatched task (low or high)
        #[arg(short, long, default_value_t = Priority::Low)]
        priority: Priority,
    },
}
