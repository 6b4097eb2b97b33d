use std::collections::BTreeMap;

use metis_primitives::{B256, Header, SealedBlock, map::HashMap};
use revm::database::{CacheDB, EmptyDB};

/// State snapshot type of the in-memory backend.
pub type StateDB = CacheDB<EmptyDB>;

/// A storage that keeps blocks, the canonical index and state snapshots in memory.
#[derive(Debug, Clone, Default)]
pub struct ChainStore {
    blocks: HashMap<B256, SealedBlock>,
    canonical: BTreeMap<u64, B256>,
    states: HashMap<B256, StateDB>,
}

impl ChainStore {
    /// Store a block. Does not touch the canonical index.
    pub fn insert_block(&mut self, block: SealedBlock) {
        self.blocks.insert(block.hash(), block);
    }

    /// Store the state snapshot with root `root`.
    pub fn insert_state(&mut self, root: B256, state: StateDB) {
        self.states.insert(root, state);
    }

    /// Block lookup by hash.
    pub fn block(&self, hash: &B256) -> Option<&SealedBlock> {
        self.blocks.get(hash)
    }

    /// Header lookup by hash.
    pub fn header(&self, hash: &B256) -> Option<&Header> {
        self.block(hash).map(SealedBlock::header)
    }

    /// State snapshot lookup by root.
    pub fn state(&self, root: &B256) -> Option<&StateDB> {
        self.states.get(root)
    }

    /// Whether a snapshot with root `root` is stored.
    pub fn has_state(&self, root: &B256) -> bool {
        self.states.contains_key(root)
    }

    /// Hash of the canonical block at `number`.
    pub fn canonical_hash(&self, number: u64) -> Option<B256> {
        self.canonical.get(&number).copied()
    }

    /// Point the canonical index at `hash` for `number`.
    pub fn set_canonical_hash(&mut self, number: u64, hash: B256) {
        self.canonical.insert(number, hash);
    }

    /// Drop every canonical entry above `number`, returning how many were dropped.
    pub fn truncate_canonical(&mut self, number: u64) -> usize {
        let Some(first) = number.checked_add(1) else {
            return 0;
        };
        self.canonical.split_off(&first).len()
    }

    /// Number of stored blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}
