use std::collections::BTreeMap;

use alloy_trie::EMPTY_ROOT_HASH;
use metis_primitives::{
    Address, B256, Block, BlockBody, Bytes, EMPTY_OMMER_ROOT_HASH, Header, SealedBlock, U256,
    keccak256, payload::MAXIMUM_EXTRA_DATA_SIZE,
};
use revm::{bytecode::Bytecode, primitives::KECCAK_EMPTY, state::AccountInfo};
use serde::{Deserialize, Serialize};

use crate::{ChainError, StateDB, state_root};

/// Pre-funded account in the genesis state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisAccount {
    /// Balance in wei.
    pub balance: U256,
    /// Account nonce.
    pub nonce: u64,
    /// Contract code.
    pub code: Option<Bytes>,
    /// Storage slots.
    pub storage: BTreeMap<U256, U256>,
}

/// Description of block 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Genesis {
    /// Block timestamp.
    pub timestamp: u64,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Base fee per gas.
    pub base_fee_per_gas: u64,
    /// Difficulty. Anything nonzero marks the genesis as pre-transition.
    pub difficulty: U256,
    /// Header extra data.
    pub extra_data: Bytes,
    /// Initial accounts.
    pub alloc: BTreeMap<Address, GenesisAccount>,
}

impl Default for Genesis {
    fn default() -> Self {
        Self {
            timestamp: 0,
            gas_limit: 30_000_000,
            base_fee_per_gas: 1_000_000_000,
            difficulty: U256::ZERO,
            extra_data: Bytes::new(),
            alloc: BTreeMap::new(),
        }
    }
}

impl Genesis {
    /// Build the genesis state.
    pub fn state(&self) -> StateDB {
        let mut db = StateDB::default();
        for (address, account) in &self.alloc {
            let (code_hash, code) = match &account.code {
                Some(code) => (keccak256(code), Some(Bytecode::new_raw(code.clone()))),
                None => (KECCAK_EMPTY, None),
            };
            let info = AccountInfo {
                balance: account.balance,
                nonce: account.nonce,
                code_hash,
                code,
            };
            db.insert_account_info(*address, info);
            if let Some(db_account) = db.cache.accounts.get_mut(address) {
                db_account.storage.extend(account.storage.iter().map(|(k, v)| (*k, *v)));
            }
        }
        db
    }

    /// Build block 0 and its state.
    pub fn build(&self) -> Result<(SealedBlock, StateDB), ChainError> {
        if self.extra_data.len() > MAXIMUM_EXTRA_DATA_SIZE {
            return Err(ChainError::ExtraData(self.extra_data.len()));
        }
        let state = self.state();
        let header = Header {
            parent_hash: B256::ZERO,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            state_root: state_root(&state),
            transactions_root: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            difficulty: self.difficulty,
            number: 0,
            gas_limit: self.gas_limit,
            timestamp: self.timestamp,
            extra_data: self.extra_data.clone(),
            base_fee_per_gas: Some(self.base_fee_per_gas),
            ..Default::default()
        };
        let block = SealedBlock::seal_slow(Block {
            header,
            body: BlockBody {
                transactions: Vec::new(),
                ommers: Vec::new(),
                withdrawals: None,
            },
        });
        Ok((block, state))
    }
}
