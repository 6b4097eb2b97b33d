//! Primitive types shared by the Metis engine crates.
//!
//! Most of the chain types are re-exported from alloy and revm so that every
//! crate in the workspace agrees on a single version. The Engine-API-shaped
//! records exchanged between a driver and the engine live in [`engine`] and
//! [`payload`].

pub use alloy_consensus::{
    BlockBody, EMPTY_OMMER_ROOT_HASH, Eip658Value, Header, Receipt, ReceiptEnvelope,
    ReceiptWithBloom, SignableTransaction, Signed, Transaction, TxEip1559, TxEip2930, TxEnvelope,
    TxLegacy, TxType, proofs, transaction::SignerRecoverable,
};
pub use alloy_eips::{
    eip1559::BaseFeeParams,
    eip2718::{Decodable2718, Eip2718Error, Encodable2718},
};
pub use alloy_primitives::{
    Address, B64, B256, Bloom, Bytes, Log, Sealed, TxKind, U256, address, b256, bytes, hex,
    keccak256, logs_bloom, map,
};
pub use revm::primitives::hardfork::SpecId;

/// A block carrying fully decoded EIP-2718 transactions.
pub type Block = alloy_consensus::Block<TxEnvelope>;

/// A header together with its hash.
pub type SealedHeader = Sealed<Header>;

mod block;
pub use block::{HeaderExt, SealedBlock};

mod config;
pub use config::ChainConfig;

pub mod engine;
pub use engine::{
    ForkchoiceState, ForkchoiceUpdated, PayloadAttributes, PayloadId, PayloadStatus,
    PayloadStatusKind,
};

pub mod payload;
pub use payload::{ExecutionPayload, PayloadError};
