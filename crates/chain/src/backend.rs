use metis_engine::{EngineBackend, GasPool, SetCanonicalError};
use metis_primitives::{
    B256, ChainConfig, Header, ReceiptEnvelope, SealedBlock, SealedHeader, TxEnvelope, logs_bloom,
    proofs,
};
use tracing::{debug, info, warn};

use crate::{ChainError, ChainStore, Genesis, StateDB, apply_transaction, state_root};

/// [`EngineBackend`] keeping the whole chain in memory.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    config: ChainConfig,
    store: ChainStore,
    genesis: SealedHeader,
    head: SealedHeader,
    safe: Option<SealedHeader>,
    finalized: Option<SealedHeader>,
}

impl InMemoryBackend {
    /// Create a chain holding only the genesis block, which is also the head.
    pub fn new(config: ChainConfig, genesis: &Genesis) -> Result<Self, ChainError> {
        let (block, state) = genesis.build()?;
        let head = block.sealed_header();
        info!(
            target: "chain",
            hash = %head.hash(),
            state_root = %head.state_root,
            chain_id = config.chain_id,
            accounts = genesis.alloc.len(),
            "initialized genesis"
        );

        let mut store = ChainStore::default();
        store.insert_state(head.state_root, state);
        store.set_canonical_hash(0, head.hash());
        store.insert_block(block);
        Ok(Self {
            config,
            store,
            genesis: head.clone(),
            head,
            safe: None,
            finalized: None,
        })
    }

    /// Genesis header.
    pub const fn genesis(&self) -> &SealedHeader {
        &self.genesis
    }

    /// Underlying storage.
    pub const fn store(&self) -> &ChainStore {
        &self.store
    }

    /// Execute every transaction of `block` on top of its parent state and
    /// check the result against the header.
    fn execute_block(&self, block: &SealedBlock) -> Result<StateDB, ChainError> {
        let header = block.header();
        let parent = self
            .store
            .header(&block.parent_hash())
            .ok_or(ChainError::UnknownAncestor {
                hash: block.hash(),
                parent: block.parent_hash(),
            })?;
        let mut state = self
            .store
            .state(&parent.state_root)
            .cloned()
            .ok_or(ChainError::MissingState(parent.state_root))?;

        let expected = self.calc_base_fee(parent);
        if header.base_fee_per_gas != expected {
            return Err(ChainError::BaseFeeMismatch {
                expected,
                got: header.base_fee_per_gas,
            });
        }

        let mut gas_pool = GasPool::new(header.gas_limit);
        let receipts = block
            .transactions()
            .iter()
            .map(|tx| apply_transaction(&self.config, header, &mut state, &mut gas_pool, tx))
            .collect::<Result<Vec<_>, _>>()?;

        let gas_used = header.gas_limit - gas_pool.gas();
        if gas_used != header.gas_used {
            return Err(ChainError::GasUsedMismatch {
                expected: gas_used,
                got: header.gas_used,
            });
        }
        let receipts_root = proofs::calculate_receipt_root(&receipts);
        if receipts_root != header.receipts_root
            || logs_bloom(receipts.iter().flat_map(|receipt| receipt.logs())) != header.logs_bloom
        {
            return Err(ChainError::ReceiptsRootMismatch {
                expected: receipts_root,
                got: header.receipts_root,
            });
        }
        let root = state_root(&state);
        if root != header.state_root {
            return Err(ChainError::StateRootMismatch {
                expected: root,
                got: header.state_root,
            });
        }
        Ok(state)
    }
}

impl EngineBackend for InMemoryBackend {
    type State = StateDB;
    type Error = ChainError;

    fn current_block(&self) -> SealedHeader {
        self.head.clone()
    }

    fn current_safe_block(&self) -> Option<SealedHeader> {
        self.safe.clone()
    }

    fn current_final_block(&self) -> Option<SealedHeader> {
        self.finalized.clone()
    }

    fn header_by_hash(&self, hash: B256) -> Option<Header> {
        self.store.header(&hash).cloned()
    }

    fn header(&self, hash: B256, number: u64) -> Option<Header> {
        self.store
            .header(&hash)
            .filter(|header| header.number == number)
            .cloned()
    }

    fn block_by_hash(&self, hash: B256) -> Option<SealedBlock> {
        self.store.block(&hash).cloned()
    }

    fn block(&self, hash: B256, number: u64) -> Option<SealedBlock> {
        self.store
            .block(&hash)
            .filter(|block| block.number() == number)
            .cloned()
    }

    fn has_block_and_state(&self, hash: B256, number: u64) -> bool {
        self.store
            .block(&hash)
            .is_some_and(|block| {
                block.number() == number && self.store.has_state(&block.header().state_root)
            })
    }

    fn canonical_hash(&self, number: u64) -> Option<B256> {
        self.store.canonical_hash(number)
    }

    fn chain_config(&self) -> &ChainConfig {
        &self.config
    }

    fn state_at(&self, root: B256) -> Result<StateDB, ChainError> {
        self.store
            .state(&root)
            .cloned()
            .ok_or(ChainError::MissingState(root))
    }

    fn apply_transaction(
        &self,
        header: &Header,
        state: &mut StateDB,
        gas_pool: &mut GasPool,
        tx: &TxEnvelope,
    ) -> Result<ReceiptEnvelope, ChainError> {
        apply_transaction(&self.config, header, state, gas_pool, tx)
    }

    fn state_root(&self, state: &StateDB) -> B256 {
        state_root(state)
    }

    fn insert_block_without_set_head(&mut self, block: SealedBlock) -> Result<(), ChainError> {
        if self.store.block(&block.hash()).is_some() {
            debug!(target: "chain", hash = %block.hash(), "block already stored");
            return Ok(());
        }
        let state = self.execute_block(&block)?;
        debug!(
            target: "chain",
            hash = %block.hash(),
            number = block.number(),
            txs = block.transactions().len(),
            "inserted block"
        );
        self.store.insert_state(block.header().state_root, state);
        self.store.insert_block(block);
        Ok(())
    }

    fn set_canonical(&mut self, head: &SealedBlock) -> Result<B256, SetCanonicalError<ChainError>> {
        let latest_valid = self.head.hash();
        let fail = |error: ChainError| SetCanonicalError {
            latest_valid,
            error,
        };
        if !self.store.has_state(&head.header().state_root) {
            return Err(fail(ChainError::MissingState(head.header().state_root)));
        }

        // Walk back until the canonical chain is met.
        let mut route = Vec::new();
        let (mut number, mut hash) = (head.number(), head.hash());
        while self.store.canonical_hash(number) != Some(hash) {
            let block = self
                .store
                .block(&hash)
                .ok_or_else(|| fail(ChainError::UnknownBlock(hash)))?;
            route.push((number, hash));
            let Some(parent) = number.checked_sub(1) else {
                // A second genesis never meets the canonical chain.
                return Err(fail(ChainError::UnknownBlock(hash)));
            };
            (number, hash) = (parent, block.parent_hash());
        }

        let dropped = self.store.truncate_canonical(number);
        if dropped > 0 {
            warn!(
                target: "chain",
                ancestor = %hash,
                number,
                dropped,
                added = route.len(),
                "chain reorg"
            );
        }
        for (number, hash) in route {
            self.store.set_canonical_hash(number, hash);
        }
        self.head = head.sealed_header();
        info!(target: "chain", number = head.number(), hash = %head.hash(), "new canonical head");
        Ok(head.hash())
    }

    fn set_safe(&mut self, header: SealedHeader) {
        debug!(target: "chain", number = header.number, hash = %header.hash(), "set safe block");
        self.safe = Some(header);
    }

    fn set_finalized(&mut self, header: SealedHeader) {
        debug!(target: "chain", number = header.number, hash = %header.hash(), "set finalized block");
        self.finalized = Some(header);
    }
}
