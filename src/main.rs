use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use retrospect::config::AppConfig;
use retrospect::llm::LlmGateway;
use retrospect::pipeline::Coordinator;

#[derive(Parser)]
#[command(author, version, about = "Multi-tier insight pipeline over a dated journal corpus")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the manifest and run the pipeline to completion
    Start,
    /// Print the current pipeline state as JSON
    Status,
    /// Clear pipeline state and return to idle; artifacts are preserved
    Reset,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store = config.build_store();
    let gateway = Arc::new(LlmGateway::new(config.gateway.clone())?);
    let coordinator = Coordinator::new(
        config.db_path.clone(),
        store,
        gateway,
        config.parallelism,
        config.cache_ttl,
    );

    match cli.command {
        Commands::Start => {
            let state = coordinator.start()?;
            info!(
                phase = state.phase.as_str(),
                processed = state.processed_entries,
                warnings = state.warnings.len(),
                "Run finished"
            );
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Status => {
            let state = coordinator.status()?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Reset => {
            coordinator.reset()?;
            println!("Pipeline reset; artifacts preserved.");
        }
    }
    Ok(())
}
