//! Engine-API-shaped records exchanged between a driver and the engine.

use std::fmt;

use alloy_primitives::{Address, B64, B256, Bytes};
use serde::{Deserialize, Serialize};

/// Identifier of an in-flight payload build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadId(pub B64);

impl PayloadId {
    /// Create from bytes.
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(B64::new(bytes))
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Attributes for building a new block on top of the forkchoice head.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadAttributes {
    /// Block timestamp.
    pub timestamp: u64,
    /// Randomness value placed in the header mix hash.
    pub prev_randao: B256,
    /// Coinbase of the new block.
    pub suggested_fee_recipient: Address,
    /// Pre-sequenced raw transactions, applied before anything else.
    #[serde(default)]
    pub transactions: Vec<Bytes>,
    /// Disallow any further transaction inclusion once the deposits are applied.
    #[serde(default)]
    pub no_tx_pool: bool,
    /// Gas limit of the new block.
    pub gas_limit: u64,
}

/// The (head, safe, finalized) triple a driver asserts should hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceState {
    /// Requested canonical head.
    pub head_block_hash: B256,
    /// Requested safe block, zero to leave untouched.
    pub safe_block_hash: B256,
    /// Requested finalized block, zero to leave untouched.
    pub finalized_block_hash: B256,
}

impl ForkchoiceState {
    /// Point head, safe and finalized at the same block.
    pub const fn same(hash: B256) -> Self {
        Self {
            head_block_hash: hash,
            safe_block_hash: hash,
            finalized_block_hash: hash,
        }
    }

    /// Only move the head, leaving safe and finalized untouched.
    pub const fn head(hash: B256) -> Self {
        Self {
            head_block_hash: hash,
            safe_block_hash: B256::ZERO,
            finalized_block_hash: B256::ZERO,
        }
    }
}

/// Outcome classification of a payload or forkchoice request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadStatusKind {
    /// The payload or head is valid.
    Valid,
    /// The payload or head is invalid.
    Invalid,
    /// The head is not known locally yet.
    Syncing,
    /// The payload was accepted without being validated.
    Accepted,
    /// The payload could not be reconstructed into a block with the claimed hash.
    InvalidBlockHash,
}

/// Status record returned for payload insertion and forkchoice updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadStatus {
    /// Outcome.
    pub status: PayloadStatusKind,
    /// Most recent block known to be valid, if any.
    pub latest_valid_hash: Option<B256>,
    /// Human readable reason for an invalid status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

impl PayloadStatus {
    /// Create a status without a validation error.
    pub const fn new(status: PayloadStatusKind, latest_valid_hash: Option<B256>) -> Self {
        Self {
            status,
            latest_valid_hash,
            validation_error: None,
        }
    }

    /// `VALID` with the given latest valid hash.
    pub const fn valid(latest_valid_hash: B256) -> Self {
        Self::new(PayloadStatusKind::Valid, Some(latest_valid_hash))
    }

    /// `INVALID` with an optional latest valid hash.
    pub const fn invalid(latest_valid_hash: Option<B256>) -> Self {
        Self::new(PayloadStatusKind::Invalid, latest_valid_hash)
    }

    /// `SYNCING`.
    pub const fn syncing() -> Self {
        Self::new(PayloadStatusKind::Syncing, None)
    }

    /// `ACCEPTED`.
    pub const fn accepted() -> Self {
        Self::new(PayloadStatusKind::Accepted, None)
    }

    /// `INVALID_BLOCK_HASH`.
    pub const fn invalid_block_hash() -> Self {
        Self::new(PayloadStatusKind::InvalidBlockHash, None)
    }

    /// Attach a validation error.
    pub fn with_validation_error(mut self, error: impl ToString) -> Self {
        self.validation_error = Some(error.to_string());
        self
    }

    /// Whether the status is `VALID`.
    pub fn is_valid(&self) -> bool {
        self.status == PayloadStatusKind::Valid
    }

    /// Whether the status is `INVALID`.
    pub fn is_invalid(&self) -> bool {
        self.status == PayloadStatusKind::Invalid
    }
}

/// Response to a forkchoice update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceUpdated {
    /// Status of the requested head.
    pub payload_status: PayloadStatus,
    /// Identifier of the build started by this update, if any.
    pub payload_id: Option<PayloadId>,
}

impl ForkchoiceUpdated {
    /// Wrap a status without a payload id.
    pub const fn from_status(payload_status: PayloadStatus) -> Self {
        Self {
            payload_status,
            payload_id: None,
        }
    }

    /// `VALID` for the given head, optionally carrying a new payload id.
    pub const fn valid(head: B256, payload_id: Option<PayloadId>) -> Self {
        Self {
            payload_status: PayloadStatus::valid(head),
            payload_id,
        }
    }

    /// `INVALID` without a latest valid hash.
    pub const fn invalid() -> Self {
        Self::from_status(PayloadStatus::invalid(None))
    }

    /// `SYNCING`.
    pub const fn syncing() -> Self {
        Self::from_status(PayloadStatus::syncing())
    }

    /// Whether the update was accepted as valid.
    pub fn is_valid(&self) -> bool {
        self.payload_status.is_valid()
    }
}
