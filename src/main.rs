//! CLI entry point for the appliance pool

use anyhow::Context;
use appliance_pool::{
    cli::{DemoArgs, ProcessArgs},
    init_logger_with_config, log_info,
    runtime::run_with_runtime,
    AppConfig,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "appliance-pool")]
#[command(about = "Pooled, cached access to an external processing appliance")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the YAML configuration file
    #[arg(short, long, global = true, default_value = "config.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process payloads through the pool
    #[command(name = "process")]
    Process(ProcessArgs),

    /// Run the Transaction1/Transaction2/Transaction1 walkthrough
    #[command(name = "demo")]
    Demo(DemoArgs),

    /// Print the effective configuration as YAML
    #[command(name = "config")]
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_missing = !cli.config.exists();
    let mut config = if config_missing {
        AppConfig::from_env_vars()
    } else {
        AppConfig::load_config_from(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config.display()))?
    };

    if cli.verbose {
        config.log_level = "debug".to_string();
    } else if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    if let Commands::Config = cli.command {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let _log_guard = init_logger_with_config(
        &config.log_level,
        config.logging.enable_file_logging,
        &config.logging.log_dir,
    );

    if config_missing {
        log_info!("⚠️  No {} found, using defaults", cli.config.display());
    }
    log_info!("📋 Version: {}", env!("CARGO_PKG_VERSION"));

    let runtime_config = config.runtime.clone();
    run_with_runtime(&runtime_config, async move {
        match cli.command {
            Commands::Process(args) => args.execute(&config).await,
            Commands::Demo(args) => args.execute(&config).await,
            Commands::Config => Ok(()),
        }
    })
}
