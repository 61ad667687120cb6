// Postgen - Main Entry Point
//
// Runs the usage and generation API and offers a few operator commands:
// - serve:        start the HTTP API
// - plans:        print plan limits and rate limit presets
// - check-config: load and validate configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use postgen_core::clock::SystemClock;
use postgen_core::config::Config;
use postgen_core::generation::OpenAiGenerator;
use postgen_core::logging;
use postgen_core::rate_limit::RateLimitPreset;
use postgen_core::server::{self, AppState};
use postgen_core::usage::{InMemoryAccountStore, InMemoryGenerationStore, Plan};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Postgen: usage-metered post generation API
#[derive(Parser, Debug)]
#[command(name = "postgen")]
#[command(version)]
#[command(about = "Usage-metered, rate-limited post generation API", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to listen on, overriding configuration
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print plan limits and rate limit presets
    Plans,
    /// Load and validate configuration
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_ref())?;
    logging::init(&config.logging, args.verbose)?;

    match args.command {
        Some(Commands::Serve { port }) => serve(config, port).await?,
        Some(Commands::Plans) => print_plans(&config),
        Some(Commands::CheckConfig) => {
            let path = args.config.unwrap_or_else(Config::config_path);
            println!("Configuration OK ({})", path.display());
            if config.generator.api_key.is_none() {
                println!("warning: no generator API key configured");
            }
        }
        None => {
            println!("postgen: use --help to see available commands");
        }
    }

    Ok(())
}

async fn serve(mut config: Config, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;
    if config.generator.api_key.is_none() {
        anyhow::bail!(
            "No generator API key configured. Set POSTGEN_GENERATOR_API_KEY or generator.api_key"
        );
    }

    let generator =
        OpenAiGenerator::new(config.generator.clone()).context("Failed to build generator client")?;
    let state = AppState::new(
        &config,
        Arc::new(InMemoryGenerationStore::new()),
        Arc::new(InMemoryAccountStore::new()),
        Arc::new(generator),
        Arc::new(SystemClock),
    );

    if !config.rate_limit.enabled {
        warn!("Rate limiting is disabled");
    }
    let sweeper = state
        .limiter
        .spawn_sweeper(config.rate_limit.sweep_interval());

    info!(
        strict = config.plans.strict_enforcement,
        boundary = ?config.plans.month_boundary,
        "Postgen v{} starting",
        env!("CARGO_PKG_VERSION")
    );
    let addr = config.server.socket_addr()?;
    let result = server::serve(state, addr).await;

    sweeper.abort();
    result
}

fn print_plans(config: &Config) {
    println!("Plans (generations per calendar month):");
    for plan in [Plan::Free, Plan::Pro] {
        println!("  {:<6} {}", plan.as_str(), config.plans.limits.limit_for(plan));
    }
    println!();
    println!(
        "Rate limits ({}):",
        if config.rate_limit.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    for preset in RateLimitPreset::ALL {
        let limit = config.rate_limit.presets.get(preset);
        println!(
            "  {:<15} {} requests / {}s",
            preset.prefix(),
            limit.max_requests,
            limit.window_ms / 1000
        );
    }
}
