//! sempool - operator tool for resource gates
//!
//! Lists the gates built from the active configuration and drives synthetic
//! workloads through them to observe the concurrency limits in practice.

mod cli;
mod display;
mod error;
mod simulate;

use crate::cli::{Cli, Commands};
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::simulate::SimulationPlan;
use clap::Parser;
use sempool_config::Config;
use sempool_resources::{Dispatcher, SystemProbe};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting sempool v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.global.config.as_deref()).await?;
    let renderer = OutputRenderer::new(cli.global.json);

    match cli.command {
        Commands::Gates => {
            let builder = Dispatcher::from_config(&config)?;
            let dispatcher = builder.build();
            renderer.render_gates(&dispatcher.registry().availability())
        }
        Commands::Simulate {
            resource,
            tasks,
            hold_ms,
            priority,
        } => {
            let builder = Dispatcher::from_config(&config)?.probe(Arc::new(SystemProbe::new()));
            let plan = SimulationPlan {
                resource,
                tasks,
                hold: Duration::from_millis(hold_ms),
                priority,
            };
            let report = simulate::run(builder, &plan).await?;
            renderer.render_simulation(&report)
        }
    }
}

/// Load configuration with proper precedence: file (or defaults), then
/// environment variables, then validation
async fn load_config(path: Option<&Path>) -> Result<Config, CliError> {
    let mut config = Config::load_or_default(path).await?;
    config.merge_env()?;
    config.validate()?;
    Ok(config)
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let default_filter = if debug_enabled {
        "info,sempool=debug,sempool_resources=debug,sempool_events=debug"
    } else {
        "warn,sempool=info,sempool_events=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_mode {
        // Keep stdout clean for the JSON document
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(debug_enabled)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[[resources]]\nname = \"ssh\"\ncapacity = 4\n\n[[resources]]\nname = \"ping\"\ncapacity = 2\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).await.unwrap();
        let names: Vec<_> = config.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(&names[..2], ["ssh", "ping"]);
    }

    #[tokio::test]
    async fn test_load_config_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[[resources]]\nname = \"ssh\"\ncapacity = 4\n\n[[resources]]\nname = \"ssh\"\ncapacity = 2\n",
        )
        .unwrap();

        let err = load_config(Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains("config.duplicate_resource"));
    }
}
