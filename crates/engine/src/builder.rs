//! The single in-flight block build.

use std::fmt;

use metis_primitives::{
    Address, B256, Block, BlockBody, Decodable2718, EMPTY_OMMER_ROOT_HASH, Header,
    PayloadAttributes, PayloadId, ReceiptEnvelope, SealedBlock, Transaction, TxEnvelope, U256,
    logs_bloom, map::HashMap, proofs,
};
use tracing::{debug, info, trace, warn};

use crate::{EngineBackend, EngineError, GasPool, compute_payload_id};

/// What happened to a transaction handed to [`BlockBuilder::include_tx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
    /// The transaction was applied and appended to the block.
    Included,
    /// The build is forced empty and the transaction was dropped.
    Ignored,
}

/// Block under construction.
struct BuildingBlock<S> {
    header: Header,
    state: S,
    gas_pool: GasPool,
    /// Per account, how many txs from the pool were already included in the block.
    pending_indices: HashMap<Address, u64>,
    transactions: Vec<TxEnvelope>,
    receipts: Vec<ReceiptEnvelope>,
    /// Transactions which could not be included. Never retried.
    failed: Vec<TxEnvelope>,
    /// No more pool transactions may be included.
    force_empty: bool,
    payload_id: PayloadId,
}

/// Owns at most one [`BuildingBlock`] and drives it through start, include and end.
pub struct BlockBuilder<S> {
    building: Option<BuildingBlock<S>>,
}

impl<S> fmt::Debug for BlockBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("BlockBuilder");
        if let Some(building) = &self.building {
            s.field("payload_id", &building.payload_id)
                .field("number", &building.header.number)
                .field("transactions", &building.transactions.len())
                .field("remaining_gas", &building.gas_pool.gas())
                .field("force_empty", &building.force_empty);
        }
        s.finish()
    }
}

impl<S> Default for BlockBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> BlockBuilder<S> {
    /// A builder with no open build.
    pub const fn new() -> Self {
        Self { building: None }
    }

    /// Whether a build is open.
    pub const fn is_building(&self) -> bool {
        self.building.is_some()
    }

    /// Id of the open build.
    pub fn payload_id(&self) -> Option<PayloadId> {
        self.building.as_ref().map(|building| building.payload_id)
    }

    /// Gas left in the open build, zero when nothing is being built.
    pub fn remaining_gas(&self) -> u64 {
        self.building
            .as_ref()
            .map_or(0, |building| building.gas_pool.gas())
    }

    /// Whether the open build refuses further pool transactions.
    pub fn forced_empty(&self) -> bool {
        self.building
            .as_ref()
            .is_some_and(|building| building.force_empty)
    }

    /// How many transactions from `from` were handed to the open build.
    pub fn pending_indices(&self, from: Address) -> u64 {
        self.building
            .as_ref()
            .and_then(|building| building.pending_indices.get(&from).copied())
            .unwrap_or_default()
    }

    /// Transactions included so far.
    pub fn transactions(&self) -> &[TxEnvelope] {
        self.building
            .as_ref()
            .map(|building| building.transactions.as_slice())
            .unwrap_or_default()
    }

    /// Transactions rejected by the backend so far.
    pub fn failed_transactions(&self) -> &[TxEnvelope] {
        self.building
            .as_ref()
            .map(|building| building.failed.as_slice())
            .unwrap_or_default()
    }

    /// Abandon the open build, returning its id.
    pub fn discard(&mut self) -> Option<PayloadId> {
        let building = self.building.take()?;
        debug!(target: "engine::builder", id = %building.payload_id, "discarding block build");
        Some(building.payload_id)
    }

    /// Open a new build on top of `parent`, applying the pre-sequenced
    /// transactions of `attrs` first.
    ///
    /// An open build is abandoned. If any step fails no build is left open.
    pub fn start<B>(
        &mut self,
        backend: &B,
        parent: B256,
        attrs: &PayloadAttributes,
    ) -> Result<PayloadId, EngineError>
    where
        B: EngineBackend<State = S>,
    {
        if let Some(previous) = self.discard() {
            warn!(
                target: "engine::builder",
                prev_payload_id = %previous,
                "started building new block without ending previous block"
            );
        }

        let parent_header = backend
            .header_by_hash(parent)
            .ok_or(EngineError::UnknownParent(parent))?;
        let state =
            backend
                .state_at(parent_header.state_root)
                .map_err(|source| EngineError::StateUnavailable {
                    block: parent,
                    root: parent_header.state_root,
                    source: source.into(),
                })?;

        let header = Header {
            parent_hash: parent,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: attrs.suggested_fee_recipient,
            difficulty: U256::ZERO,
            number: parent_header.number + 1,
            gas_limit: attrs.gas_limit,
            timestamp: attrs.timestamp,
            mix_hash: attrs.prev_randao,
            base_fee_per_gas: backend.calc_base_fee(&parent_header),
            ..Default::default()
        };

        let mut building = BuildingBlock {
            gas_pool: GasPool::new(header.gas_limit),
            header,
            state,
            pending_indices: HashMap::default(),
            transactions: Vec::with_capacity(attrs.transactions.len()),
            receipts: Vec::with_capacity(attrs.transactions.len()),
            failed: Vec::new(),
            force_empty: attrs.no_tx_pool,
            payload_id: compute_payload_id(parent, attrs),
        };

        for (index, raw) in attrs.transactions.iter().enumerate() {
            let tx = TxEnvelope::decode_2718(&mut raw.as_ref())
                .map_err(|source| EngineError::InvalidTransaction { index, source })?;
            let receipt = backend
                .apply_transaction(
                    &building.header,
                    &mut building.state,
                    &mut building.gas_pool,
                    &tx,
                )
                .map_err(|source| EngineError::DepositFailed {
                    index,
                    source: source.into(),
                })?;
            building.receipts.push(receipt);
            building.transactions.push(tx);
        }

        let id = building.payload_id;
        info!(
            target: "engine::builder",
            %id,
            %parent,
            number = building.header.number,
            deposits = building.transactions.len(),
            no_tx_pool = building.force_empty,
            "started block build"
        );
        self.building = Some(building);
        Ok(id)
    }

    /// Apply `tx` from `from` to the open build.
    ///
    /// The sender's pending index is bumped before execution, so a transaction
    /// that fails is never handed out again.
    pub fn include_tx<B>(
        &mut self,
        backend: &B,
        tx: &TxEnvelope,
        from: Address,
    ) -> Result<Inclusion, EngineError>
    where
        B: EngineBackend<State = S>,
    {
        let Some(building) = self.building.as_mut() else {
            return Err(EngineError::NoActiveBuild);
        };
        if building.force_empty {
            info!(target: "engine::builder", tx = %tx.tx_hash(), "skipping transaction, block is forced empty");
            return Ok(Inclusion::Ignored);
        }

        let tx_gas = tx.gas_limit();
        if tx_gas > building.header.gas_limit {
            return Err(EngineError::ExceedsGasLimit {
                tx_gas,
                gas_limit: building.header.gas_limit,
            });
        }
        if tx_gas > building.gas_pool.gas() {
            return Err(EngineError::ExceedsRemainingGas {
                tx_gas,
                remaining: building.gas_pool.gas(),
            });
        }

        *building.pending_indices.entry(from).or_default() += 1;
        let index = building.transactions.len();
        match backend.apply_transaction(
            &building.header,
            &mut building.state,
            &mut building.gas_pool,
            tx,
        ) {
            Ok(receipt) => {
                trace!(target: "engine::builder", index, tx = %tx.tx_hash(), %from, "included transaction");
                building.receipts.push(receipt);
                building.transactions.push(tx.clone());
                Ok(Inclusion::Included)
            }
            Err(err) => {
                debug!(target: "engine::builder", index, tx = %tx.tx_hash(), %from, %err, "transaction failed");
                building.failed.push(tx.clone());
                Err(EngineError::ApplicationFailed {
                    index,
                    source: err.into(),
                })
            }
        }
    }

    /// Close the open build and seal it into a block.
    ///
    /// The working state is dropped; persisting it is up to whoever inserts
    /// the returned block.
    pub fn end<B>(&mut self, backend: &B) -> Result<SealedBlock, EngineError>
    where
        B: EngineBackend<State = S>,
    {
        let BuildingBlock {
            mut header,
            state,
            gas_pool,
            transactions,
            receipts,
            payload_id,
            ..
        } = self.building.take().ok_or(EngineError::NoActiveBuild)?;

        header.gas_used = header.gas_limit - gas_pool.gas();
        header.state_root = backend.state_root(&state);
        drop(state);
        header.transactions_root = proofs::calculate_transaction_root(&transactions);
        header.receipts_root = proofs::calculate_receipt_root(&receipts);
        header.logs_bloom = logs_bloom(receipts.iter().flat_map(|receipt| receipt.logs()));

        let block = SealedBlock::seal_slow(Block {
            header,
            body: BlockBody {
                transactions,
                ommers: Vec::new(),
                withdrawals: None,
            },
        });
        info!(
            target: "engine::builder",
            id = %payload_id,
            hash = %block.hash(),
            number = block.number(),
            txs = block.transactions().len(),
            gas_used = block.header().gas_used,
            "sealed block"
        );
        Ok(block)
    }
}
