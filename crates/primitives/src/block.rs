use alloy_primitives::B256;

use crate::{Block, Header, SealedHeader, TxEnvelope};

/// Helpers on consensus headers.
pub trait HeaderExt {
    /// Whether the header belongs to the legacy proof-of-work regime.
    ///
    /// Anything with a nonzero difficulty is never a valid post-transition anchor.
    fn is_pre_transition(&self) -> bool;
}

impl HeaderExt for Header {
    fn is_pre_transition(&self) -> bool {
        !self.difficulty.is_zero()
    }
}

/// A [`Block`] together with its header hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlock {
    hash: B256,
    block: Block,
}

impl SealedBlock {
    /// Seal a block by hashing its header.
    pub fn seal_slow(block: Block) -> Self {
        let hash = block.header.hash_slow();
        Self { hash, block }
    }

    /// Construct a sealed block from a hash that is trusted to match the header.
    pub const fn new_unchecked(block: Block, hash: B256) -> Self {
        Self { hash, block }
    }

    /// Block hash.
    pub const fn hash(&self) -> B256 {
        self.hash
    }

    /// Block header.
    pub const fn header(&self) -> &Header {
        &self.block.header
    }

    /// Block number.
    pub const fn number(&self) -> u64 {
        self.block.header.number
    }

    /// Parent block hash.
    pub const fn parent_hash(&self) -> B256 {
        self.block.header.parent_hash
    }

    /// Block timestamp.
    pub const fn timestamp(&self) -> u64 {
        self.block.header.timestamp
    }

    /// Clone out the header together with the block hash.
    pub fn sealed_header(&self) -> SealedHeader {
        SealedHeader::new_unchecked(self.block.header.clone(), self.hash)
    }

    /// Transactions of the block body, in order.
    pub fn transactions(&self) -> &[TxEnvelope] {
        &self.block.body.transactions
    }

    /// Borrow the inner block.
    pub const fn block(&self) -> &Block {
        &self.block
    }

    /// Consume into the inner block.
    pub fn into_block(self) -> Block {
        self.block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    #[test]
    fn test_seal_matches_header_hash() {
        let header = Header {
            number: 7,
            gas_limit: 30_000_000,
            ..Default::default()
        };
        let expected = header.hash_slow();
        let sealed = SealedBlock::seal_slow(Block {
            header,
            body: Default::default(),
        });
        assert_eq!(sealed.hash(), expected);
        assert_eq!(sealed.number(), 7);
        assert!(!sealed.header().is_pre_transition());
    }

    #[test]
    fn test_difficulty_marks_pre_transition() {
        let header = Header {
            difficulty: U256::from(1),
            ..Default::default()
        };
        assert!(header.is_pre_transition());
    }
}
