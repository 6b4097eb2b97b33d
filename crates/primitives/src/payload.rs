//! Execution payload record and its conversion to and from blocks.

use alloy_consensus::{BlockBody, EMPTY_OMMER_ROOT_HASH, Header, TxEnvelope, proofs};
use alloy_eips::eip2718::{Decodable2718, Eip2718Error, Encodable2718};
use alloy_primitives::{Address, B64, B256, Bloom, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::{Block, SealedBlock};

/// Maximum size of the header extra data.
pub const MAXIMUM_EXTRA_DATA_SIZE: usize = 32;

/// Errors when reconstructing a block from an [`ExecutionPayload`].
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// A transaction failed to decode.
    #[error("transaction {index} is not valid: {source}")]
    Transaction {
        /// Position in the payload.
        index: usize,
        /// Decoding failure.
        #[source]
        source: Eip2718Error,
    },
    /// Extra data exceeds [`MAXIMUM_EXTRA_DATA_SIZE`].
    #[error("invalid extra data length: {0}")]
    ExtraData(usize),
    /// The reconstructed header does not hash to the claimed block hash.
    #[error("blockhash mismatch, want {expected}, got {computed}")]
    BlockHashMismatch {
        /// Hash carried by the payload.
        expected: B256,
        /// Hash of the reconstructed header.
        computed: B256,
    },
}

/// A block in the shape it travels between the driver and the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayload {
    /// Parent block hash.
    pub parent_hash: B256,
    /// Coinbase.
    pub fee_recipient: Address,
    /// Post-state root.
    pub state_root: B256,
    /// Receipts trie root.
    pub receipts_root: B256,
    /// Bloom of all receipt logs.
    pub logs_bloom: Bloom,
    /// Header mix hash.
    pub prev_randao: B256,
    /// Block number.
    pub block_number: u64,
    /// Gas limit.
    pub gas_limit: u64,
    /// Gas used by all transactions.
    pub gas_used: u64,
    /// Block timestamp.
    pub timestamp: u64,
    /// Header extra data.
    pub extra_data: Bytes,
    /// Base fee per gas.
    pub base_fee_per_gas: u64,
    /// Hash of the block.
    pub block_hash: B256,
    /// EIP-2718 encoded transactions.
    pub transactions: Vec<Bytes>,
}

impl ExecutionPayload {
    /// Convert a sealed block into a payload.
    pub fn from_block(block: &SealedBlock) -> Self {
        let header = block.header();
        Self {
            parent_hash: header.parent_hash,
            fee_recipient: header.beneficiary,
            state_root: header.state_root,
            receipts_root: header.receipts_root,
            logs_bloom: header.logs_bloom,
            prev_randao: header.mix_hash,
            block_number: header.number,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            timestamp: header.timestamp,
            extra_data: header.extra_data.clone(),
            base_fee_per_gas: header.base_fee_per_gas.unwrap_or_default(),
            block_hash: block.hash(),
            transactions: block
                .transactions()
                .iter()
                .map(|tx| tx.encoded_2718().into())
                .collect(),
        }
    }

    /// Rebuild the block described by this payload and check its hash.
    pub fn try_into_block(self) -> Result<SealedBlock, PayloadError> {
        if self.extra_data.len() > MAXIMUM_EXTRA_DATA_SIZE {
            return Err(PayloadError::ExtraData(self.extra_data.len()));
        }

        let transactions = self
            .transactions
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                TxEnvelope::decode_2718(&mut raw.as_ref())
                    .map_err(|source| PayloadError::Transaction { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let header = Header {
            parent_hash: self.parent_hash,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: self.fee_recipient,
            state_root: self.state_root,
            transactions_root: proofs::calculate_transaction_root(&transactions),
            receipts_root: self.receipts_root,
            logs_bloom: self.logs_bloom,
            difficulty: U256::ZERO,
            number: self.block_number,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            timestamp: self.timestamp,
            extra_data: self.extra_data,
            mix_hash: self.prev_randao,
            nonce: B64::ZERO,
            base_fee_per_gas: Some(self.base_fee_per_gas),
            ..Default::default()
        };

        let block = SealedBlock::seal_slow(Block {
            header,
            body: BlockBody {
                transactions,
                ommers: Vec::new(),
                withdrawals: None,
            },
        });
        if block.hash() != self.block_hash {
            return Err(PayloadError::BlockHashMismatch {
                expected: self.block_hash,
                computed: block.hash(),
            });
        }
        Ok(block)
    }
}
