//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use metis_app::{config, scenario};
use metis_chain::InMemoryBackend;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Deterministic block building and fork-choice driver.
#[derive(Debug, Parser)]
#[command(name = "metis")]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a scenario against a fresh in-memory chain.
    Run {
        /// Path to configuration file.
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Path to the JSON scenario.
        #[arg(short, long)]
        script: PathBuf,
    },

    /// Initialize a new configuration file.
    Init {
        /// Output path for the config file.
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

impl Cli {
    /// Execute the CLI command.
    pub(crate) fn run(self) -> Result<()> {
        match self.command {
            Commands::Run { config, script } => Self::run_scenario(config, script),
            Commands::Init { output } => {
                init_tracing("info");
                Self::init_config(output)
            }
        }
    }

    fn run_scenario(config: PathBuf, script: PathBuf) -> Result<()> {
        let cfg = config::load(&config)?;
        init_tracing(&cfg.log_level);
        info!(config = %config.display(), chain_id = cfg.chain.chain_id, "loaded configuration");

        let backend = InMemoryBackend::new(cfg.chain, &cfg.genesis)
            .wrap_err("failed to initialize genesis")?;
        let steps = scenario::load(&script)?;
        info!(script = %script.display(), steps = steps.len(), "running scenario");

        let mut driver = scenario::Driver::new(backend);
        let summary = driver.run(&steps)?;
        info!(number = summary.number, head = %summary.head, "scenario finished");
        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok(())
    }

    fn init_config(output: PathBuf) -> Result<()> {
        info!(path = %output.display(), "generating default configuration");
        let cfg = config::default_config();
        let toml_str = toml::to_string_pretty(&cfg)?;
        std::fs::write(&output, toml_str)
            .wrap_err_with(|| format!("failed to write config file: {}", output.display()))?;
        info!("configuration written");
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
