use metis_primitives::{B256, Eip2718Error, PayloadId};

/// Type-erased backend failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a forkchoice state was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ForkchoiceStateError {
    /// The safe block is not known.
    #[error("safe block not available in database")]
    SafeNotAvailable,
    /// The safe block is known but not canonical.
    #[error("safe block not in canonical chain")]
    SafeNotCanonical,
    /// The finalized block is not known.
    #[error("final block not available in database")]
    FinalNotAvailable,
    /// The finalized block is known but not canonical.
    #[error("final block not in canonical chain")]
    FinalNotCanonical,
}

/// Errors returned by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No build is open.
    #[error("not currently building a block, cannot include tx from queue")]
    NoActiveBuild,
    /// The transaction alone does not fit in a block.
    #[error("tx gas exceeds block gas limit, tx gas: {tx_gas}, block gas limit: {gas_limit}")]
    ExceedsGasLimit {
        /// Gas limit of the transaction.
        tx_gas: u64,
        /// Gas limit of the block.
        gas_limit: u64,
    },
    /// The transaction does not fit in what is left of the block.
    #[error("action takes too much gas: {tx_gas}, only have {remaining}")]
    ExceedsRemainingGas {
        /// Gas limit of the transaction.
        tx_gas: u64,
        /// Gas left in the block.
        remaining: u64,
    },
    /// The backend failed to apply an included transaction.
    #[error("invalid L2 block (tx {index}): {source}")]
    ApplicationFailed {
        /// Position the transaction would have taken in the block.
        index: usize,
        /// Backend failure.
        #[source]
        source: BoxError,
    },
    /// A pre-sequenced transaction could not be decoded.
    #[error("transaction {index} is not valid: {source}")]
    InvalidTransaction {
        /// Position in the payload attributes.
        index: usize,
        /// Decoding failure.
        #[source]
        source: Eip2718Error,
    },
    /// The backend failed to apply a pre-sequenced transaction.
    #[error("failed to apply deposit transaction to L2 block (tx {index}): {source}")]
    DepositFailed {
        /// Position in the payload attributes.
        index: usize,
        /// Backend failure.
        #[source]
        source: BoxError,
    },
    /// The build parent is not known.
    #[error("unknown parent block: {0}")]
    UnknownParent(B256),
    /// The parent state could not be opened.
    #[error("failed to init state db around block {block} (state {root}): {source}")]
    StateUnavailable {
        /// Parent block hash.
        block: B256,
        /// Parent state root.
        root: B256,
        /// Backend failure.
        #[source]
        source: BoxError,
    },
    /// The payload id does not match the open build.
    #[error("unknown payload {0}")]
    UnknownPayload(PayloadId),
    /// The safe or finalized block of a forkchoice update is unusable.
    #[error("invalid forkchoice state: {reason}")]
    InvalidForkchoiceState {
        /// What was wrong.
        reason: ForkchoiceStateError,
    },
    /// A forkchoice update asked for a build that could not be started.
    #[error("invalid payload attributes: {0}")]
    InvalidPayloadAttributes(#[source] Box<EngineError>),
    /// The head was moved back to an older canonical block on a chain that
    /// does not allow sequencers to reorg themselves.
    #[error(
        "engine not configured as rollup engine, cannot move head {head} back to canonical block {number} ({hash})"
    )]
    ReorgNotPermitted {
        /// Number of the requested head.
        number: u64,
        /// Hash of the requested head.
        hash: B256,
        /// Current canonical head.
        head: B256,
    },
}

impl EngineError {
    /// Whether the engine cannot keep its chain pointers consistent after this error.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ReorgNotPermitted { .. })
    }
}

impl From<ForkchoiceStateError> for EngineError {
    fn from(reason: ForkchoiceStateError) -> Self {
        Self::InvalidForkchoiceState { reason }
    }
}
