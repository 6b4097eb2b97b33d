//! Forkchoice reconciliation: head moves, reorgs, safe and finalized pointers.

use metis_chain::ChainError;
use metis_engine::{EngineBackend, EngineError, ForkchoiceStateError};
use metis_primitives::{
    B256, ChainConfig, ForkchoiceState, ForkchoiceUpdated, PayloadStatusKind, U256,
};
use pretty_assertions::assert_eq;

pub mod common;

use common::GENESIS_TIMESTAMP;

#[test]
fn zero_head_is_invalid() {
    let mut engine = common::engine();
    let updated = engine
        .forkchoice_updated(ForkchoiceState::head(B256::ZERO), None)
        .unwrap();
    assert_eq!(updated, ForkchoiceUpdated::invalid());
    assert_eq!(updated.payload_status.latest_valid_hash, None);
}

#[test]
fn unknown_head_is_syncing() {
    let mut engine = common::engine();
    let updated = engine
        .forkchoice_updated(
            ForkchoiceState::head(B256::repeat_byte(0x11)),
            Some(common::attrs(GENESIS_TIMESTAMP + 2)),
        )
        .unwrap();
    assert_eq!(updated.payload_status.status, PayloadStatusKind::Syncing);
    assert_eq!(updated.payload_id, None);
    assert!(!engine.is_building());
}

#[test]
fn pre_transition_head_is_invalid() {
    let mut genesis = common::genesis(1);
    genesis.difficulty = U256::from(131_072);
    let mut engine = common::engine_with(ChainConfig::default(), genesis);
    let head = engine.backend().current_block().hash();

    for attrs in [None, Some(common::attrs(GENESIS_TIMESTAMP + 2))] {
        let updated = engine
            .forkchoice_updated(ForkchoiceState::same(head), attrs)
            .unwrap();
        assert_eq!(updated.payload_status.status, PayloadStatusKind::Invalid);
        assert_eq!(updated.payload_status.latest_valid_hash, None);
        assert_eq!(updated.payload_id, None);
    }
    assert!(!engine.is_building());
    assert_eq!(engine.backend().current_safe_block(), None);
}

#[test]
fn repeated_update_is_idempotent() {
    let mut engine = common::engine();
    let alice = common::signer(1);
    let block = common::extend_chain(
        &mut engine,
        &[(
            common::transfer(&alice, 0, common::RAW_TRANSFER_GAS_LIMIT),
            alice.address(),
        )],
    );
    let state = ForkchoiceState::same(block.block_hash);

    let first = engine.forkchoice_updated(state, None).unwrap();
    assert_eq!(first, ForkchoiceUpdated::valid(block.block_hash, None));
    let pointers = |engine: &metis_engine::EngineApi<metis_chain::InMemoryBackend>| {
        let backend = engine.backend();
        (
            backend.current_block().hash(),
            backend.current_safe_block().map(|header| header.hash()),
            backend.current_final_block().map(|header| header.hash()),
        )
    };
    let before = pointers(&engine);
    assert_eq!(
        before,
        (block.block_hash, Some(block.block_hash), Some(block.block_hash))
    );

    let second = engine.forkchoice_updated(state, None).unwrap();
    assert_eq!(second, first);
    assert_eq!(pointers(&engine), before);
}

#[test]
fn update_starts_build_on_new_head() {
    let mut engine = common::engine();
    let genesis = engine.backend().current_block();
    let child = common::build_block(&mut engine, genesis.hash(), GENESIS_TIMESTAMP + 2, &[]);
    assert!(engine.new_payload(child.clone()).is_valid());

    let updated = engine
        .forkchoice_updated(
            ForkchoiceState::head(child.block_hash),
            Some(common::attrs(GENESIS_TIMESTAMP + 4)),
        )
        .unwrap();
    assert!(updated.is_valid());
    assert_eq!(engine.backend().current_block().hash(), child.block_hash);
    let id = updated.payload_id.unwrap();
    assert_eq!(engine.payload_id(), Some(id));

    let payload = engine.get_payload(id).unwrap();
    assert_eq!(payload.parent_hash, child.block_hash);
    assert_eq!(payload.block_number, 2);
}

#[test]
fn final_block_checked_before_safe() {
    let mut engine = common::engine();
    let genesis = engine.backend().current_block().hash();
    let unknown = B256::repeat_byte(0x22);

    let state = ForkchoiceState {
        head_block_hash: genesis,
        safe_block_hash: unknown,
        finalized_block_hash: unknown,
    };
    let err = engine.forkchoice_updated(state, None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidForkchoiceState {
            reason: ForkchoiceStateError::FinalNotAvailable
        }
    ));

    let state = ForkchoiceState {
        finalized_block_hash: genesis,
        ..state
    };
    let err = engine.forkchoice_updated(state, None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidForkchoiceState {
            reason: ForkchoiceStateError::SafeNotAvailable
        }
    ));
    // Finalized was already reconciled before safe failed.
    assert_eq!(
        engine
            .backend()
            .current_final_block()
            .map(|header| header.hash()),
        Some(genesis)
    );
    assert_eq!(engine.backend().current_safe_block(), None);
}

#[test]
fn non_canonical_safe_and_final_are_rejected() {
    let mut engine = common::engine();
    let genesis = engine.backend().current_block().hash();
    let left = common::build_block(&mut engine, genesis, GENESIS_TIMESTAMP + 2, &[]);
    let right = common::build_block(&mut engine, genesis, GENESIS_TIMESTAMP + 4, &[]);
    assert!(engine.new_payload(left.clone()).is_valid());
    assert!(engine.new_payload(right.clone()).is_valid());

    let state = ForkchoiceState {
        head_block_hash: left.block_hash,
        safe_block_hash: right.block_hash,
        finalized_block_hash: B256::ZERO,
    };
    let err = engine.forkchoice_updated(state, None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidForkchoiceState {
            reason: ForkchoiceStateError::SafeNotCanonical
        }
    ));
    assert!(!err.is_fatal());
    // The head moved before safe was looked at.
    assert_eq!(engine.backend().current_block().hash(), left.block_hash);

    let state = ForkchoiceState {
        head_block_hash: left.block_hash,
        safe_block_hash: B256::ZERO,
        finalized_block_hash: right.block_hash,
    };
    let err = engine.forkchoice_updated(state, None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidForkchoiceState {
            reason: ForkchoiceStateError::FinalNotCanonical
        }
    ));
}

#[test]
fn reorg_to_sibling() {
    let mut engine = common::engine();
    let alice = common::signer(1);
    let genesis = engine.backend().current_block().hash();

    let left = common::extend_chain(&mut engine, &[]);
    let left_child = common::extend_chain(&mut engine, &[]);
    assert_eq!(engine.backend().canonical_hash(2), Some(left_child.block_hash));

    let right = common::build_block(
        &mut engine,
        genesis,
        GENESIS_TIMESTAMP + 5,
        &[(
            common::transfer(&alice, 0, common::RAW_TRANSFER_GAS_LIMIT),
            alice.address(),
        )],
    );
    assert!(engine.new_payload(right.clone()).is_valid());
    // Still on the left branch until forkchoice says otherwise.
    assert_eq!(engine.backend().canonical_hash(1), Some(left.block_hash));

    let updated = engine
        .forkchoice_updated(ForkchoiceState::head(right.block_hash), None)
        .unwrap();
    assert!(updated.is_valid());
    let backend = engine.backend();
    assert_eq!(backend.current_block().hash(), right.block_hash);
    assert_eq!(backend.canonical_hash(0), Some(genesis));
    assert_eq!(backend.canonical_hash(1), Some(right.block_hash));
    assert_eq!(backend.canonical_hash(2), None);
}

#[test]
fn older_canonical_head_on_rollup_keeps_head() {
    let mut engine = common::engine();
    let first = common::extend_chain(&mut engine, &[]);
    let second = common::extend_chain(&mut engine, &[]);

    let updated = engine
        .forkchoice_updated(ForkchoiceState::head(first.block_hash), None)
        .unwrap();
    assert_eq!(updated, ForkchoiceUpdated::valid(first.block_hash, None));
    assert_eq!(engine.backend().current_block().hash(), second.block_hash);
    assert_eq!(engine.backend().canonical_hash(2), Some(second.block_hash));
}

#[test]
fn older_canonical_head_without_rollup_is_fatal() {
    let config = ChainConfig {
        rollup: false,
        ..Default::default()
    };
    let mut engine = common::engine_with(config, common::genesis(1));
    let first = common::extend_chain(&mut engine, &[]);
    let second = common::extend_chain(&mut engine, &[]);

    let err = engine
        .forkchoice_updated(ForkchoiceState::head(first.block_hash), None)
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        EngineError::ReorgNotPermitted { number: 1, hash, head }
            if hash == first.block_hash && head == second.block_hash
    ));
    assert_eq!(engine.backend().current_block().hash(), second.block_hash);
}

#[test]
fn build_failure_is_reported_after_head_update() {
    let mut engine = common::engine();
    let genesis = engine.backend().current_block().hash();
    let child = common::build_block(&mut engine, genesis, GENESIS_TIMESTAMP + 2, &[]);
    assert!(engine.new_payload(child.clone()).is_valid());

    let mut attrs = common::attrs(GENESIS_TIMESTAMP + 4);
    attrs.transactions = vec![metis_primitives::Bytes::from_static(&[0xc0])];
    let err = engine
        .forkchoice_updated(ForkchoiceState::head(child.block_hash), Some(attrs))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPayloadAttributes(_)));
    assert_eq!(engine.backend().current_block().hash(), child.block_hash);
    assert!(!engine.is_building());
}

#[test]
fn failed_head_change_is_invalid() {
    let mut engine = common::engine();
    let genesis = engine.backend().current_block().hash();
    let head = common::extend_chain(&mut engine, &[]);
    let fork = common::build_block(&mut engine, genesis, GENESIS_TIMESTAMP + 5, &[]);
    assert!(engine.new_payload(fork.clone()).is_valid());

    let mut engine = common::FaultyBackend::wrap(engine);
    engine.backend_mut().reject_set_canonical = true;
    let updated = engine
        .forkchoice_updated(
            ForkchoiceState::head(fork.block_hash),
            Some(common::attrs(GENESIS_TIMESTAMP + 7)),
        )
        .unwrap();
    assert_eq!(updated.payload_status.status, PayloadStatusKind::Invalid);
    assert_eq!(
        updated.payload_status.latest_valid_hash,
        Some(head.block_hash)
    );
    assert_eq!(
        updated.payload_status.validation_error,
        Some(ChainError::UnknownBlock(fork.block_hash).to_string())
    );
    assert_eq!(updated.payload_id, None);
    assert!(!engine.is_building());
    assert_eq!(engine.backend().current_block().hash(), head.block_hash);
    assert_eq!(engine.backend().canonical_hash(1), Some(head.block_hash));
}
