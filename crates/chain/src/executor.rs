//! Transaction execution and state commitment on top of revm.

use alloy_trie::{
    TrieAccount,
    root::{state_root_unhashed, storage_root_unhashed},
};
use metis_engine::GasPool;
use metis_primitives::{
    Address, B256, ChainConfig, Eip658Value, Header, Receipt, ReceiptEnvelope, ReceiptWithBloom,
    SignerRecoverable, Transaction, TxEnvelope, TxType, U256, logs_bloom,
};
use revm::{
    Context, ExecuteCommitEvm, MainBuilder,
    context::{BlockEnv, CfgEnv, TxEnv},
    handler::MainnetContext,
};
use tracing::trace;

use crate::{ChainError, StateDB};

/// Apply `tx` to `state` inside the block described by `header`.
///
/// The whole gas limit of the transaction is reserved from `gas_pool` before
/// execution and the unused part is returned afterwards. A transaction that
/// fails validation leaves both `state` and `gas_pool` untouched; a reverted
/// transaction is still applied and yields a failed receipt.
pub fn apply_transaction(
    config: &ChainConfig,
    header: &Header,
    state: &mut StateDB,
    gas_pool: &mut GasPool,
    tx: &TxEnvelope,
) -> Result<ReceiptEnvelope, ChainError> {
    let caller = tx
        .recover_signer()
        .map_err(|_| ChainError::InvalidSignature {
            hash: *tx.tx_hash(),
        })?;
    let tx_env = tx_env(tx, caller)?;

    let gas_limit = tx.gas_limit();
    gas_pool.sub_gas(gas_limit)?;

    let ctx: MainnetContext<&mut StateDB> = Context::new(&mut *state, ChainConfig::SPEC);
    let mut evm = ctx
        .with_cfg(cfg_env(config))
        .with_block(block_env(header))
        .build_mainnet();
    let result = match evm.transact_commit(tx_env) {
        Ok(result) => result,
        Err(err) => {
            gas_pool.add_gas(gas_limit);
            return Err(err.into());
        }
    };
    let gas_used = result.gas_used();
    gas_pool.add_gas(gas_limit - gas_used);
    trace!(
        target: "chain",
        tx = %tx.tx_hash(),
        %caller,
        gas_used,
        success = result.is_success(),
        "applied transaction"
    );

    let receipt = Receipt {
        status: Eip658Value::Eip658(result.is_success()),
        cumulative_gas_used: header.gas_limit - gas_pool.gas(),
        logs: result.into_logs(),
    };
    let receipt = ReceiptWithBloom {
        logs_bloom: logs_bloom(receipt.logs.iter()),
        receipt,
    };
    Ok(match tx.tx_type() {
        TxType::Legacy => ReceiptEnvelope::Legacy(receipt),
        TxType::Eip2930 => ReceiptEnvelope::Eip2930(receipt),
        TxType::Eip1559 => ReceiptEnvelope::Eip1559(receipt),
        TxType::Eip4844 => ReceiptEnvelope::Eip4844(receipt),
        TxType::Eip7702 => ReceiptEnvelope::Eip7702(receipt),
    })
}

/// Merkle-Patricia root of every non-empty account in `state`.
pub fn state_root(state: &StateDB) -> B256 {
    state_root_unhashed(
        state
            .cache
            .accounts
            .iter()
            .filter(|(_, account)| !account.info.is_empty())
            .map(|(address, account)| {
                let storage_root = storage_root_unhashed(
                    account
                        .storage
                        .iter()
                        .filter(|(_, value)| !value.is_zero())
                        .map(|(slot, value)| (B256::from(slot.to_be_bytes::<32>()), *value)),
                );
                (
                    *address,
                    TrieAccount {
                        nonce: account.info.nonce,
                        balance: account.info.balance,
                        storage_root,
                        code_hash: account.info.code_hash,
                    },
                )
            }),
    )
}

fn cfg_env(config: &ChainConfig) -> CfgEnv {
    let mut cfg = CfgEnv::new_with_spec(ChainConfig::SPEC);
    cfg.chain_id = config.chain_id;
    cfg
}

fn block_env(header: &Header) -> BlockEnv {
    BlockEnv {
        number: U256::from(header.number),
        beneficiary: header.beneficiary,
        timestamp: U256::from(header.timestamp),
        gas_limit: header.gas_limit,
        basefee: header.base_fee_per_gas.unwrap_or_default(),
        difficulty: header.difficulty,
        prevrandao: Some(header.mix_hash),
        ..Default::default()
    }
}

fn tx_env(tx: &TxEnvelope, caller: Address) -> Result<TxEnv, ChainError> {
    let tx_type = tx.tx_type();
    if matches!(tx_type, TxType::Eip4844 | TxType::Eip7702) {
        return Err(ChainError::UnsupportedTransactionType(tx_type));
    }
    Ok(TxEnv {
        tx_type: tx_type as u8,
        caller,
        gas_limit: tx.gas_limit(),
        gas_price: tx.max_fee_per_gas(),
        kind: tx.kind(),
        value: tx.value(),
        data: tx.input().clone(),
        nonce: tx.nonce(),
        chain_id: tx.chain_id(),
        access_list: tx.access_list().cloned().unwrap_or_default(),
        gas_priority_fee: tx.max_priority_fee_per_gas(),
        ..Default::default()
    })
}
