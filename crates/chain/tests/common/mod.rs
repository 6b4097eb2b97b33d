use std::collections::BTreeMap;

use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use metis_chain::{ChainError, Genesis, GenesisAccount, InMemoryBackend, StateDB};
use metis_engine::{EngineApi, EngineBackend, GasPool, SetCanonicalError};
use metis_primitives::{
    Address, B256, Bytes, ChainConfig, Encodable2718, ExecutionPayload, ForkchoiceState, Header,
    PayloadAttributes, ReceiptEnvelope, SealedBlock, SealedHeader, SignableTransaction, TxEip1559,
    TxEnvelope, TxKind, U256,
};

/// The gas limit for a basic transfer transaction.
pub const RAW_TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Block gas limit used by the test builds.
pub const BLOCK_GAS_LIMIT: u64 = 30_000_000;

/// Timestamp of the test genesis.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Recipient of every test transfer.
pub const RECIPIENT: Address = Address::repeat_byte(0xee);

/// Deterministic test account `idx`.
pub fn signer(idx: u8) -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::with_last_byte(idx)).unwrap()
}

/// Genesis funding `accounts` test signers with 1000 ether each.
pub fn genesis(accounts: u8) -> Genesis {
    Genesis {
        timestamp: GENESIS_TIMESTAMP,
        gas_limit: BLOCK_GAS_LIMIT,
        alloc: (1..=accounts)
            .map(|idx| {
                (
                    signer(idx).address(),
                    GenesisAccount {
                        balance: U256::from(1_000u64) * U256::from(10u64).pow(U256::from(18)),
                        ..Default::default()
                    },
                )
            })
            .collect::<BTreeMap<_, _>>(),
        ..Default::default()
    }
}

/// Engine on a fresh chain with two funded accounts.
pub fn engine() -> EngineApi<InMemoryBackend> {
    engine_with(ChainConfig::default(), genesis(2))
}

/// Engine on a fresh chain.
pub fn engine_with(config: ChainConfig, genesis: Genesis) -> EngineApi<InMemoryBackend> {
    EngineApi::new(InMemoryBackend::new(config, &genesis).unwrap())
}

/// A signed EIP-1559 value transfer to [`RECIPIENT`].
pub fn transfer(signer: &PrivateKeySigner, nonce: u64, gas_limit: u64) -> TxEnvelope {
    let tx = TxEip1559 {
        chain_id: ChainConfig::default().chain_id,
        nonce,
        gas_limit,
        max_fee_per_gas: 10_000_000_000,
        max_priority_fee_per_gas: 1_000_000_000,
        to: TxKind::Call(RECIPIENT),
        value: U256::from(1),
        ..Default::default()
    };
    let signature = signer.sign_hash_sync(&tx.signature_hash()).unwrap();
    TxEnvelope::from(tx.into_signed(signature))
}

/// EIP-2718 encoding of `tx`, the shape deposits travel in.
pub fn raw(tx: &TxEnvelope) -> Bytes {
    tx.encoded_2718().into()
}

/// Build parameters for a child at `timestamp`.
pub fn attrs(timestamp: u64) -> PayloadAttributes {
    PayloadAttributes {
        timestamp,
        prev_randao: B256::repeat_byte(0x42),
        suggested_fee_recipient: Address::repeat_byte(0x0f),
        transactions: Vec::new(),
        no_tx_pool: false,
        gas_limit: BLOCK_GAS_LIMIT,
    }
}

/// Build and seal a child of `parent` holding `txs`, without moving the head.
pub fn build_block(
    engine: &mut EngineApi<InMemoryBackend>,
    parent: B256,
    timestamp: u64,
    txs: &[(TxEnvelope, Address)],
) -> ExecutionPayload {
    let updated = engine
        .forkchoice_updated(ForkchoiceState::head(parent), Some(attrs(timestamp)))
        .unwrap();
    let id = updated.payload_id.unwrap();
    for (tx, from) in txs {
        engine.include_tx(tx, *from).unwrap();
    }
    engine.get_payload(id).unwrap()
}

/// Build a child of the current head, insert it and make it the new head.
pub fn extend_chain(
    engine: &mut EngineApi<InMemoryBackend>,
    txs: &[(TxEnvelope, Address)],
) -> ExecutionPayload {
    let head = engine.backend().current_block();
    let payload = build_block(engine, head.hash(), head.timestamp + 2, txs);
    assert!(engine.new_payload(payload.clone()).is_valid());
    assert!(
        engine
            .forkchoice_updated(ForkchoiceState::head(payload.block_hash), None)
            .unwrap()
            .is_valid()
    );
    payload
}

/// [`InMemoryBackend`] with switchable faults the in-memory chain never shows
/// on its own.
#[derive(Debug)]
pub struct FaultyBackend {
    /// The chain being wrapped.
    pub inner: InMemoryBackend,
    /// Report every block as stored without its state.
    pub state_pruned: bool,
    /// Refuse every head change.
    pub reject_set_canonical: bool,
}

impl FaultyBackend {
    /// Move the backend of `engine` behind a wrapper with no faults enabled.
    pub fn wrap(engine: EngineApi<InMemoryBackend>) -> EngineApi<Self> {
        EngineApi::new(Self {
            inner: engine.into_backend(),
            state_pruned: false,
            reject_set_canonical: false,
        })
    }
}

impl EngineBackend for FaultyBackend {
    type State = StateDB;
    type Error = ChainError;

    fn current_block(&self) -> SealedHeader {
        self.inner.current_block()
    }

    fn current_safe_block(&self) -> Option<SealedHeader> {
        self.inner.current_safe_block()
    }

    fn current_final_block(&self) -> Option<SealedHeader> {
        self.inner.current_final_block()
    }

    fn header_by_hash(&self, hash: B256) -> Option<Header> {
        self.inner.header_by_hash(hash)
    }

    fn header(&self, hash: B256, number: u64) -> Option<Header> {
        self.inner.header(hash, number)
    }

    fn block_by_hash(&self, hash: B256) -> Option<SealedBlock> {
        self.inner.block_by_hash(hash)
    }

    fn block(&self, hash: B256, number: u64) -> Option<SealedBlock> {
        self.inner.block(hash, number)
    }

    fn has_block_and_state(&self, hash: B256, number: u64) -> bool {
        !self.state_pruned && self.inner.has_block_and_state(hash, number)
    }

    fn canonical_hash(&self, number: u64) -> Option<B256> {
        self.inner.canonical_hash(number)
    }

    fn chain_config(&self) -> &ChainConfig {
        self.inner.chain_config()
    }

    fn state_at(&self, root: B256) -> Result<StateDB, ChainError> {
        self.inner.state_at(root)
    }

    fn apply_transaction(
        &self,
        header: &Header,
        state: &mut StateDB,
        gas_pool: &mut GasPool,
        tx: &TxEnvelope,
    ) -> Result<ReceiptEnvelope, ChainError> {
        self.inner.apply_transaction(header, state, gas_pool, tx)
    }

    fn state_root(&self, state: &StateDB) -> B256 {
        self.inner.state_root(state)
    }

    fn insert_block_without_set_head(&mut self, block: SealedBlock) -> Result<(), ChainError> {
        self.inner.insert_block_without_set_head(block)
    }

    fn set_canonical(&mut self, head: &SealedBlock) -> Result<B256, SetCanonicalError<ChainError>> {
        if self.reject_set_canonical {
            return Err(SetCanonicalError {
                latest_valid: self.inner.current_block().hash(),
                error: ChainError::UnknownBlock(head.hash()),
            });
        }
        self.inner.set_canonical(head)
    }

    fn set_safe(&mut self, header: SealedHeader) {
        self.inner.set_safe(header);
    }

    fn set_finalized(&mut self, header: SealedHeader) {
        self.inner.set_finalized(header);
    }
}
