use alloy_eips::eip1559::BaseFeeParams;
use serde::{Deserialize, Serialize};

use crate::SpecId;

/// Chain rules the engine and its execution backend agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain id used for transaction replay protection.
    pub chain_id: u64,
    /// Whether the chain is configured as a rollup. Rollup sequencers are
    /// allowed to point forkchoice back at an older canonical block.
    pub rollup: bool,
    /// EIP-1559 elasticity multiplier.
    pub eip1559_elasticity: u64,
    /// EIP-1559 base fee max change denominator.
    pub eip1559_denominator: u64,
}

impl ChainConfig {
    /// The EVM spec all blocks are executed with.
    pub const SPEC: SpecId = SpecId::SHANGHAI;

    /// Base fee parameters for the EIP-1559 rule.
    pub const fn base_fee_params(&self) -> BaseFeeParams {
        BaseFeeParams::new(
            self.eip1559_denominator as u128,
            self.eip1559_elasticity as u128,
        )
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 901,
            rollup: true,
            eip1559_elasticity: 2,
            eip1559_denominator: 8,
        }
    }
}
