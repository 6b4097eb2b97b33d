//! Scripted driver: a JSON list of steps executed against the engine.
//!
//! Blocks are referred to by label. `genesis` and `head` are always defined;
//! every sealed block can be given a label of its own.

use std::path::Path;

use eyre::{Context, OptionExt, Result};
use metis_chain::InMemoryBackend;
use metis_engine::{EngineApi, EngineBackend, EngineError, Inclusion};
use metis_primitives::{
    Address, B256, Bytes, Decodable2718, ForkchoiceState, PayloadAttributes, PayloadId,
    PayloadStatusKind, TxEnvelope, map::HashMap,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A single driver action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Move forkchoice to `head` and start a build on it.
    Build {
        /// Parent label, the current head by default.
        #[serde(default)]
        parent: Option<String>,
        /// Block timestamp, parent timestamp + 2 by default.
        #[serde(default)]
        timestamp: Option<u64>,
        /// Gas limit, the parent's by default.
        #[serde(default)]
        gas_limit: Option<u64>,
        /// Refuse pool transactions.
        #[serde(default)]
        no_tx_pool: bool,
        /// Deposits applied at the start of the block.
        #[serde(default)]
        transactions: Vec<Bytes>,
    },
    /// Include an EIP-2718 encoded transaction from `from`.
    Include {
        /// Encoded transaction.
        tx: Bytes,
        /// Sender.
        from: Address,
    },
    /// Retrieve the open build and insert it.
    Seal {
        /// Label to give the sealed block.
        #[serde(default)]
        label: Option<String>,
    },
    /// Update forkchoice without building.
    Forkchoice {
        /// Head label.
        head: String,
        /// Safe label.
        #[serde(default)]
        safe: Option<String>,
        /// Finalized label.
        #[serde(default)]
        finalized: Option<String>,
    },
}

/// Chain pointers after a scenario ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Canonical head number.
    pub number: u64,
    /// Canonical head hash.
    pub head: B256,
    /// Safe block hash.
    pub safe: Option<B256>,
    /// Finalized block hash.
    pub finalized: Option<B256>,
    /// Transactions that failed during the last build.
    pub failed: usize,
}

/// Read a scenario file.
pub fn load(path: &Path) -> Result<Vec<Step>> {
    let contents = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read scenario file: {}", path.display()))?;
    serde_json::from_str(&contents).wrap_err("failed to parse scenario")
}

/// Executes [`Step`]s against an [`EngineApi`].
#[derive(Debug)]
pub struct Driver {
    engine: EngineApi<InMemoryBackend>,
    labels: HashMap<String, B256>,
    building: Option<PayloadId>,
    failed: usize,
}

impl Driver {
    /// Driver over a fresh engine.
    pub fn new(backend: InMemoryBackend) -> Self {
        let mut labels = HashMap::default();
        labels.insert("genesis".to_string(), backend.genesis().hash());
        Self {
            engine: EngineApi::new(backend),
            labels,
            building: None,
            failed: 0,
        }
    }

    /// The driven engine.
    pub const fn engine(&self) -> &EngineApi<InMemoryBackend> {
        &self.engine
    }

    /// Hash of the block labelled `label`.
    pub fn resolve(&self, label: &str) -> Result<B256> {
        if label == "head" {
            return Ok(self.engine.backend().current_block().hash());
        }
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| eyre::eyre!("unknown block label: {label}"))
    }

    /// Run every step in order.
    pub fn run(&mut self, steps: &[Step]) -> Result<Summary> {
        for (index, step) in steps.iter().enumerate() {
            self.step(step)
                .wrap_err_with(|| format!("scenario step {index} failed"))?;
        }
        Ok(self.summary())
    }

    /// Current chain pointers.
    pub fn summary(&self) -> Summary {
        let backend = self.engine.backend();
        let head = backend.current_block();
        Summary {
            number: head.number,
            head: head.hash(),
            safe: backend.current_safe_block().map(|header| header.hash()),
            finalized: backend.current_final_block().map(|header| header.hash()),
            failed: self.failed,
        }
    }

    /// Execute a single step.
    pub fn step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Build {
                parent,
                timestamp,
                gas_limit,
                no_tx_pool,
                transactions,
            } => {
                let parent = self.resolve(parent.as_deref().unwrap_or("head"))?;
                let parent_header = self
                    .engine
                    .backend()
                    .header_by_hash(parent)
                    .ok_or_eyre("build parent is not stored")?;
                let attrs = PayloadAttributes {
                    timestamp: timestamp.unwrap_or(parent_header.timestamp + 2),
                    prev_randao: B256::ZERO,
                    suggested_fee_recipient: Address::ZERO,
                    transactions: transactions.clone(),
                    no_tx_pool: *no_tx_pool,
                    gas_limit: gas_limit.unwrap_or(parent_header.gas_limit),
                };
                let updated = self
                    .engine
                    .forkchoice_updated(ForkchoiceState::head(parent), Some(attrs))?;
                let id = updated
                    .payload_id
                    .ok_or_else(|| eyre::eyre!("build not started: {:?}", updated.payload_status))?;
                info!(target: "engine", %id, %parent, "build started");
                self.building = Some(id);
                self.failed = 0;
            }
            Step::Include { tx, from } => {
                let tx = TxEnvelope::decode_2718(&mut tx.as_ref())
                    .map_err(|err| eyre::eyre!("invalid transaction: {err}"))?;
                match self.engine.include_tx(&tx, *from) {
                    Ok(Inclusion::Included) => {
                        info!(target: "engine", tx = %tx.tx_hash(), %from, "included")
                    }
                    Ok(Inclusion::Ignored) => {
                        info!(target: "engine", tx = %tx.tx_hash(), %from, "ignored, block is forced empty")
                    }
                    // The sequencer moves on to the next transaction.
                    Err(
                        err @ (EngineError::ApplicationFailed { .. }
                        | EngineError::ExceedsGasLimit { .. }
                        | EngineError::ExceedsRemainingGas { .. }),
                    ) => {
                        warn!(target: "engine", tx = %tx.tx_hash(), %from, %err, "transaction skipped");
                        self.failed += 1;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Step::Seal { label } => {
                let id = self.building.take().ok_or_eyre("no build to seal")?;
                let payload = self.engine.get_payload(id)?;
                let hash = payload.block_hash;
                let number = payload.block_number;
                let status = self.engine.new_payload(payload);
                if status.status != PayloadStatusKind::Valid {
                    eyre::bail!("sealed block {hash} rejected: {status:?}");
                }
                info!(target: "engine", number, %hash, "sealed");
                if let Some(label) = label {
                    self.labels.insert(label.clone(), hash);
                }
            }
            Step::Forkchoice {
                head,
                safe,
                finalized,
            } => {
                let state = ForkchoiceState {
                    head_block_hash: self.resolve(head)?,
                    safe_block_hash: self.resolve_or_zero(safe.as_deref())?,
                    finalized_block_hash: self.resolve_or_zero(finalized.as_deref())?,
                };
                let updated = self.engine.forkchoice_updated(state, None)?;
                info!(target: "engine", status = ?updated.payload_status.status, head = %state.head_block_hash, "forkchoice updated");
                if !updated.is_valid() {
                    eyre::bail!("forkchoice update rejected: {:?}", updated.payload_status);
                }
            }
        }
        Ok(())
    }

    fn resolve_or_zero(&self, label: Option<&str>) -> Result<B256> {
        label.map_or(Ok(B256::ZERO), |label| self.resolve(label))
    }
}
