use metis_primitives::{B256, PayloadAttributes, PayloadId};
use sha2::{Digest, Sha256};

/// Compute the id of the build started on `parent` with `attrs`.
///
/// Identical inputs always give the same id. Every transaction is length
/// prefixed so moving bytes across a transaction boundary changes the id.
pub fn compute_payload_id(parent: B256, attrs: &PayloadAttributes) -> PayloadId {
    let mut hasher = Sha256::new();
    hasher.update(parent);
    hasher.update(attrs.timestamp.to_be_bytes());
    hasher.update(attrs.prev_randao);
    hasher.update(attrs.suggested_fee_recipient);
    hasher.update([attrs.no_tx_pool as u8]);
    hasher.update((attrs.transactions.len() as u64).to_be_bytes());
    for tx in &attrs.transactions {
        hasher.update((tx.len() as u64).to_be_bytes());
        hasher.update(tx);
    }
    hasher.update(attrs.gas_limit.to_be_bytes());

    let digest = hasher.finalize();
    let mut id = [0u8; 8];
    id.copy_from_slice(&digest[..8]);
    PayloadId::new(id)
}
