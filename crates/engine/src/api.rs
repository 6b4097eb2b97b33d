//! Forkchoice reconciliation, payload retrieval and payload insertion.

use std::fmt;

use metis_primitives::{
    Address, B256, ExecutionPayload, ForkchoiceState, ForkchoiceUpdated, HeaderExt,
    PayloadAttributes, PayloadId, PayloadStatus, SealedHeader, TxEnvelope,
};
use tracing::{debug, error, trace, warn};

use crate::{
    BlockBuilder, EngineBackend, EngineError, ForkchoiceStateError, Inclusion, SetCanonicalError,
};

/// Engine-API-shaped controller over an [`EngineBackend`].
///
/// Unlike a real engine it does not follow consensus timing: the driver decides
/// when a build starts, which transactions go in and when it is sealed, which
/// makes it possible to script very specific edge cases.
pub struct EngineApi<B: EngineBackend> {
    backend: B,
    builder: BlockBuilder<B::State>,
}

impl<B: EngineBackend + fmt::Debug> fmt::Debug for EngineApi<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineApi")
            .field("backend", &self.backend)
            .field("builder", &self.builder)
            .finish()
    }
}

impl<B: EngineBackend> EngineApi<B> {
    /// Wrap `backend`; no build is open.
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            builder: BlockBuilder::new(),
        }
    }

    /// The execution backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the execution backend.
    pub const fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The block builder.
    pub const fn builder(&self) -> &BlockBuilder<B::State> {
        &self.builder
    }

    /// Release the backend, dropping any open build.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Gas left in the open build.
    pub fn remaining_block_gas(&self) -> u64 {
        self.builder.remaining_gas()
    }

    /// Whether the open build refuses pool transactions.
    pub fn forced_empty(&self) -> bool {
        self.builder.forced_empty()
    }

    /// How far the transaction queue of `from` has been consumed by the open build.
    pub fn pending_indices(&self, from: Address) -> u64 {
        self.builder.pending_indices(from)
    }

    /// Transactions rejected during the open build.
    pub fn failed_transactions(&self) -> &[TxEnvelope] {
        self.builder.failed_transactions()
    }

    /// Id of the open build.
    pub fn payload_id(&self) -> Option<PayloadId> {
        self.builder.payload_id()
    }

    /// Whether a build is open.
    pub const fn is_building(&self) -> bool {
        self.builder.is_building()
    }

    /// Include a transaction from `from` into the open build.
    pub fn include_tx(&mut self, tx: &TxEnvelope, from: Address) -> Result<Inclusion, EngineError> {
        self.builder.include_tx(&self.backend, tx, from)
    }

    /// Reconcile the requested forkchoice state and optionally start a build on the new head.
    ///
    /// The canonical head moves first, then the finalized and safe pointers,
    /// and only then is a build started, so a build is always rooted at a head
    /// that is already canonical.
    pub fn forkchoice_updated(
        &mut self,
        state: ForkchoiceState,
        attrs: Option<PayloadAttributes>,
    ) -> Result<ForkchoiceUpdated, EngineError> {
        trace!(
            target: "engine",
            head = %state.head_block_hash,
            safe = %state.safe_block_hash,
            finalized = %state.finalized_block_hash,
            "forkchoice updated request received"
        );
        let head = state.head_block_hash;
        if head.is_zero() {
            warn!(target: "engine", "forkchoice requested update to zero hash");
            return Ok(ForkchoiceUpdated::invalid());
        }

        // Backfilling unknown heads is out of reach, just report syncing.
        let Some(block) = self.backend.block_by_hash(head) else {
            debug!(target: "engine", %head, "forkchoice head unknown");
            return Ok(ForkchoiceUpdated::syncing());
        };
        if block.header().is_pre_transition() {
            warn!(target: "engine", %head, number = block.number(), "forkchoice head is a pre-merge block");
            return Ok(ForkchoiceUpdated::from_status(
                PayloadStatus::invalid(None).with_validation_error("pre-merge blocks not supported"),
            ));
        }

        if self.backend.canonical_hash(block.number()) != Some(head) {
            if let Err(SetCanonicalError {
                latest_valid,
                error,
            }) = self.backend.set_canonical(&block)
            {
                warn!(target: "engine", %head, %latest_valid, %error, "failed to set canonical head");
                return Ok(ForkchoiceUpdated::from_status(
                    PayloadStatus::invalid(Some(latest_valid)).with_validation_error(error),
                ));
            }
        } else if self.backend.current_block().hash() == head {
            // Same head as before, the driver is iterating payloads in the same slot.
        } else if self.backend.chain_config().rollup {
            debug!(
                target: "engine",
                %head,
                current = %self.backend.current_block().hash(),
                "forkchoice points at an older canonical block, keeping current head"
            );
        } else {
            return Err(EngineError::ReorgNotPermitted {
                number: block.number(),
                hash: head,
                head: self.backend.current_block().hash(),
            });
        }

        if !state.finalized_block_hash.is_zero() {
            let header = self.canonical_header(
                state.finalized_block_hash,
                ForkchoiceStateError::FinalNotAvailable,
                ForkchoiceStateError::FinalNotCanonical,
            )?;
            self.backend.set_finalized(header);
        }
        if !state.safe_block_hash.is_zero() {
            let header = self.canonical_header(
                state.safe_block_hash,
                ForkchoiceStateError::SafeNotAvailable,
                ForkchoiceStateError::SafeNotCanonical,
            )?;
            self.backend.set_safe(header);
        }

        let Some(attrs) = attrs else {
            return Ok(ForkchoiceUpdated::valid(head, None));
        };
        let id = self
            .builder
            .start(&self.backend, head, &attrs)
            .map_err(|err| {
                error!(
                    target: "engine",
                    %err,
                    no_tx_pool = attrs.no_tx_pool,
                    txs = attrs.transactions.len(),
                    timestamp = attrs.timestamp,
                    "failed to start block building"
                );
                EngineError::InvalidPayloadAttributes(Box::new(err))
            })?;
        Ok(ForkchoiceUpdated::valid(head, Some(id)))
    }

    /// Close the build identified by `payload_id` and return it as a payload.
    ///
    /// Retrieval is single-shot: once returned, the id is unknown.
    pub fn get_payload(&mut self, payload_id: PayloadId) -> Result<ExecutionPayload, EngineError> {
        trace!(target: "engine", id = %payload_id, "get payload request received");
        let expected = self.builder.payload_id();
        if expected != Some(payload_id) {
            warn!(target: "engine", ?expected, got = %payload_id, "unexpected payload ID requested for block building");
            return Err(EngineError::UnknownPayload(payload_id));
        }
        let block = self.builder.end(&self.backend).map_err(|err| {
            error!(target: "engine", %err, "failed to finish block building");
            EngineError::UnknownPayload(payload_id)
        })?;
        Ok(ExecutionPayload::from_block(&block))
    }

    /// Validate and store an externally built payload without moving the head.
    pub fn new_payload(&mut self, payload: ExecutionPayload) -> PayloadStatus {
        trace!(
            target: "engine",
            number = payload.block_number,
            hash = %payload.block_hash,
            "new payload request received"
        );
        let block = match payload.try_into_block() {
            Ok(block) => block,
            Err(err) => {
                debug!(target: "engine", %err, "invalid new payload params");
                return PayloadStatus::invalid_block_hash();
            }
        };

        if let Some(known) = self.backend.block_by_hash(block.hash()) {
            warn!(target: "engine", number = known.number(), hash = %known.hash(), "ignoring already known payload");
            return PayloadStatus::valid(known.hash());
        }

        // Previously rejected payloads are not remembered.
        let parent = block
            .number()
            .checked_sub(1)
            .and_then(|number| self.backend.block(block.parent_hash(), number));
        let Some(parent) = parent else {
            debug!(target: "engine", parent = %block.parent_hash(), "parent unknown, accepting payload");
            return PayloadStatus::accepted();
        };

        if block.timestamp() <= parent.timestamp() {
            warn!(
                target: "engine",
                parent = parent.timestamp(),
                block = block.timestamp(),
                "invalid timestamp"
            );
            return self.invalid("invalid timestamp", Some(&parent.sealed_header()));
        }

        if !self
            .backend
            .has_block_and_state(parent.hash(), parent.number())
        {
            warn!(target: "engine", parent = %parent.hash(), "state not available, ignoring new payload");
            return PayloadStatus::accepted();
        }

        let hash = block.hash();
        trace!(target: "engine", %hash, number = block.number(), "inserting block without sethead");
        if let Err(err) = self.backend.insert_block_without_set_head(block) {
            warn!(target: "engine", %hash, %err, "inserting block failed");
            return self.invalid(err, Some(&parent.sealed_header()));
        }
        PayloadStatus::valid(hash)
    }

    fn invalid(&self, error: impl fmt::Display, latest_valid: Option<&SealedHeader>) -> PayloadStatus {
        invalid_status(error, latest_valid, self.backend.current_block().hash())
    }

    fn canonical_header(
        &self,
        hash: B256,
        missing: ForkchoiceStateError,
        not_canonical: ForkchoiceStateError,
    ) -> Result<SealedHeader, ForkchoiceStateError> {
        let Some(header) = self.backend.header_by_hash(hash) else {
            warn!(target: "engine", %hash, "{missing}");
            return Err(missing);
        };
        if self.backend.canonical_hash(header.number) != Some(hash) {
            warn!(target: "engine", number = header.number, %hash, "{not_canonical}");
            return Err(not_canonical);
        }
        Ok(SealedHeader::new_unchecked(header, hash))
    }
}

/// Build an `INVALID` status.
///
/// The latest valid hash is the given header's hash, the zero hash if that
/// header is pre-transition, or `current_head` when no header is given. A
/// pre-transition block is never advertised as a valid anchor.
pub fn invalid_status(
    error: impl fmt::Display,
    latest_valid: Option<&SealedHeader>,
    current_head: B256,
) -> PayloadStatus {
    let latest_valid_hash = match latest_valid {
        Some(header) if header.is_pre_transition() => B256::ZERO,
        Some(header) => header.hash(),
        None => current_head,
    };
    PayloadStatus::invalid(Some(latest_valid_hash)).with_validation_error(error)
}
