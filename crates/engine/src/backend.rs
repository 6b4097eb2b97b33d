use metis_primitives::{
    B256, ChainConfig, Header, ReceiptEnvelope, SealedBlock, SealedHeader, TxEnvelope,
};

/// Remaining gas budget of the block under construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasPool(u64);

/// The pool holds less gas than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("gas limit reached: have {available}, want {requested}")]
pub struct GasPoolError {
    /// Gas left in the pool.
    pub available: u64,
    /// Gas that was requested.
    pub requested: u64,
}

impl GasPool {
    /// A pool holding `gas`.
    pub const fn new(gas: u64) -> Self {
        Self(gas)
    }

    /// Gas left in the pool.
    pub const fn gas(&self) -> u64 {
        self.0
    }

    /// Take `amount` out of the pool.
    pub const fn sub_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        if self.0 < amount {
            return Err(GasPoolError {
                available: self.0,
                requested: amount,
            });
        }
        self.0 -= amount;
        Ok(())
    }

    /// Return `amount` to the pool.
    pub const fn add_gas(&mut self, amount: u64) {
        self.0 = self.0.saturating_add(amount);
    }
}

/// Failure to move the canonical head.
#[derive(Debug)]
pub struct SetCanonicalError<E> {
    /// Most recent block that is still known to be valid.
    pub latest_valid: B256,
    /// The underlying failure.
    pub error: E,
}

/// Chain storage, state access and transaction execution the engine relies on.
///
/// The engine never executes EVM code or touches storage itself: everything
/// below is delegated to the backend, which is expected to be cheap to call
/// synchronously.
pub trait EngineBackend {
    /// Mutable state view a block is built against.
    type State;

    /// Backend failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current canonical head.
    fn current_block(&self) -> SealedHeader;

    /// Current safe block, if one was set.
    fn current_safe_block(&self) -> Option<SealedHeader>;

    /// Current finalized block, if one was set.
    fn current_final_block(&self) -> Option<SealedHeader>;

    /// Header lookup by hash.
    fn header_by_hash(&self, hash: B256) -> Option<Header>;

    /// Header lookup by hash and number.
    fn header(&self, hash: B256, number: u64) -> Option<Header>;

    /// Block lookup by hash.
    fn block_by_hash(&self, hash: B256) -> Option<SealedBlock>;

    /// Block lookup by hash and number.
    fn block(&self, hash: B256, number: u64) -> Option<SealedBlock>;

    /// Whether both the block and its post-state are available.
    fn has_block_and_state(&self, hash: B256, number: u64) -> bool;

    /// Hash of the canonical block at `number`.
    fn canonical_hash(&self, number: u64) -> Option<B256>;

    /// Chain rules.
    fn chain_config(&self) -> &ChainConfig;

    /// Open a state view rooted at `root`.
    fn state_at(&self, root: B256) -> Result<Self::State, Self::Error>;

    /// Apply `tx` on top of `state` within the block described by `header`.
    ///
    /// On success the gas used by the transaction has been taken from
    /// `gas_pool`. On failure neither `state` nor `gas_pool` change.
    fn apply_transaction(
        &self,
        header: &Header,
        state: &mut Self::State,
        gas_pool: &mut GasPool,
        tx: &TxEnvelope,
    ) -> Result<ReceiptEnvelope, Self::Error>;

    /// Root of the state view in its current form.
    fn state_root(&self, state: &Self::State) -> B256;

    /// Base fee of the child of `parent`.
    fn calc_base_fee(&self, parent: &Header) -> Option<u64> {
        parent.next_block_base_fee(self.chain_config().base_fee_params())
    }

    /// Execute and store a block without moving the canonical head.
    fn insert_block_without_set_head(&mut self, block: SealedBlock) -> Result<(), Self::Error>;

    /// Make `head` the canonical head, reorganizing if needed.
    fn set_canonical(&mut self, head: &SealedBlock) -> Result<B256, SetCanonicalError<Self::Error>>;

    /// Move the safe pointer.
    fn set_safe(&mut self, header: SealedHeader);

    /// Move the finalized pointer.
    fn set_finalized(&mut self, header: SealedHeader);
}
