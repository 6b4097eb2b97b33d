use std::convert::Infallible;

use metis_engine::GasPoolError;
use metis_primitives::{B256, TxType};
use revm::context::result::EVMError;

/// Errors produced by the in-memory backend.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The sender could not be recovered from the signature.
    #[error("invalid transaction signature: {hash}")]
    InvalidSignature {
        /// Transaction hash.
        hash: B256,
    },
    /// The transaction type cannot be executed by this backend.
    #[error("unsupported transaction type: {0}")]
    UnsupportedTransactionType(TxType),
    /// Not enough gas left in the block.
    #[error(transparent)]
    GasPool(#[from] GasPoolError),
    /// revm rejected the transaction.
    #[error("transaction execution failed: {0}")]
    Execution(#[from] EVMError<Infallible>),
    /// No state snapshot under the given root.
    #[error("missing trie node {0}")]
    MissingState(B256),
    /// A block needed to walk the chain is not stored.
    #[error("unknown block {0}")]
    UnknownBlock(B256),
    /// The parent of an inserted block is not stored.
    #[error("unknown ancestor {parent} of block {hash}")]
    UnknownAncestor {
        /// Inserted block.
        hash: B256,
        /// Missing parent.
        parent: B256,
    },
    /// Header base fee differs from the one derived from the parent.
    #[error("invalid base fee: have {got:?}, want {expected:?}")]
    BaseFeeMismatch {
        /// Base fee derived from the parent.
        expected: Option<u64>,
        /// Base fee in the header.
        got: Option<u64>,
    },
    /// Header gas used differs from the re-executed amount.
    #[error("invalid gas used (remote: {got} local: {expected})")]
    GasUsedMismatch {
        /// Gas used by re-execution.
        expected: u64,
        /// Gas used in the header.
        got: u64,
    },
    /// Header state root differs from the re-executed state.
    #[error("invalid merkle root (remote: {got} local: {expected})")]
    StateRootMismatch {
        /// Root of the re-executed state.
        expected: B256,
        /// Root in the header.
        got: B256,
    },
    /// Header receipts root differs from the re-executed receipts.
    #[error("invalid receipt root hash (remote: {got} local: {expected})")]
    ReceiptsRootMismatch {
        /// Root of the re-executed receipts.
        expected: B256,
        /// Root in the header.
        got: B256,
    },
    /// Genesis extra data is too long.
    #[error("invalid extra data length: {0}")]
    ExtraData(usize),
}
