//! Configuration loading.

use std::path::Path;

use eyre::{Context, Result};
use metis_chain::{Genesis, GenesisAccount};
use metis_primitives::{ChainConfig, U256, address};
use serde::{Deserialize, Serialize};

/// Prefix of the environment variables overriding the configuration file,
/// e.g. `METIS__CHAIN__CHAIN_ID=10`.
pub const ENV_PREFIX: &str = "METIS";

/// Complete driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default log filter, overridden by `RUST_LOG`.
    pub log_level: String,
    /// Chain rules.
    pub chain: ChainConfig,
    /// Block 0.
    pub genesis: Genesis,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            chain: ChainConfig::default(),
            genesis: Genesis::default(),
        }
    }
}

/// Load configuration from a TOML file, then apply `METIS__*` overrides.
pub fn load(path: &Path) -> Result<AppConfig> {
    let config = ::config::Config::builder()
        .add_source(::config::File::from(path))
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
    let config: AppConfig = config
        .try_deserialize()
        .wrap_err("failed to parse configuration")?;
    validate(&config)?;
    Ok(config)
}

/// Validate the configuration.
pub fn validate(config: &AppConfig) -> Result<()> {
    if config.chain.chain_id == 0 {
        eyre::bail!("chain_id must be non-zero");
    }
    if config.chain.eip1559_denominator == 0 || config.chain.eip1559_elasticity == 0 {
        eyre::bail!("eip1559 parameters must be non-zero");
    }
    if config.genesis.gas_limit == 0 {
        eyre::bail!("genesis gas_limit must be non-zero");
    }
    Ok(())
}

/// Generate a default configuration with one funded development account.
pub fn default_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.genesis.alloc.insert(
        // Address of the private key 0x...01.
        address!("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"),
        GenesisAccount {
            balance: U256::from(10u64).pow(U256::from(21)),
            ..Default::default()
        },
    );
    config
}
