//! proxy queue for batched insertion
//!
//! decouples "a commitment exists" from "it is anchored in a tree":
//! submitters append to per-tree queues at any time, and a batch
//! relayer later commits contiguous power-of-two slices. queues are
//! append-only; indices are monotonic from 0 and never reused.

use serde::{Deserialize, Serialize};
use tracing::debug;

use masp_merkle::Hash;
use masp_pool::{Amount, AssetId, Commitment, MaspUtxo, Nullifier, TokenId};

use crate::error::{AnchorError, Result};
use crate::RECORD_DOMAIN;

/// which tree a queue entry is destined for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreeTarget {
    /// value commitments
    Deposit,
    /// H(commitment, timestamp) records, inserted when notes become spendable
    UnspentRecord,
    /// H(nullifier, timestamp) records, inserted when notes are consumed
    SpentRecord,
}

/// fungible vs non-fungible deposits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetType {
    Fungible,
    NonFungible,
}

/// a pending deposit awaiting batch insertion
///
/// carries enough metadata to insert later without re-deriving
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedDeposit {
    pub asset_type: AssetType,
    pub asset_id: AssetId,
    pub token_id: TokenId,
    pub amount: Amount,
    pub commitment: Commitment,
    pub partial_commitment: Commitment,
    /// true when the deposit arrived from inside the shielded pool
    pub shielded: bool,
}

/// a pending unspent/spent record leaf
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRecord {
    pub leaf: Hash,
    pub timestamp: u64,
}

/// record leaf: H(value, timestamp)
pub fn record_leaf(value: &[u8; 32], timestamp: u64) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(RECORD_DOMAIN);
    hasher.update(value);
    hasher.update(&timestamp.to_be_bytes());
    *hasher.finalize().as_bytes()
}

/// append-only queues, one per target tree
#[derive(Clone, Debug, Default)]
pub struct ProxyQueue {
    deposits: Vec<QueuedDeposit>,
    unspent: Vec<QueuedRecord>,
    spent: Vec<QueuedRecord>,
    /// consumed pointers, advanced only by committed batches
    consumed: [u64; 3],
}

impl ProxyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(target: TreeTarget) -> usize {
        match target {
            TreeTarget::Deposit => 0,
            TreeTarget::UnspentRecord => 1,
            TreeTarget::SpentRecord => 2,
        }
    }

    /// queue a deposit; returns its assigned queue index
    pub fn queue_deposit(&mut self, info: QueuedDeposit) -> u64 {
        let index = self.deposits.len() as u64;
        self.deposits.push(info);
        debug!(index, "queued deposit");
        index
    }

    /// queue a deposit derived from a note's own fields
    pub fn queue_deposit_from_utxo(&mut self, utxo: &MaspUtxo, shielded: bool) -> u64 {
        let asset_type = if utxo.token_id.is_fungible() {
            AssetType::Fungible
        } else {
            AssetType::NonFungible
        };
        self.queue_deposit(QueuedDeposit {
            asset_type,
            asset_id: utxo.asset_id,
            token_id: utxo.token_id,
            amount: utxo.amount,
            commitment: utxo.commitment(),
            partial_commitment: utxo.partial_commitment(),
            shielded,
        })
    }

    /// queue an unspent record for a commitment observed at `timestamp`
    pub fn queue_unspent_record(&mut self, commitment: Commitment, timestamp: u64) -> u64 {
        let index = self.unspent.len() as u64;
        self.unspent.push(QueuedRecord {
            leaf: record_leaf(&commitment.0, timestamp),
            timestamp,
        });
        debug!(index, timestamp, "queued unspent record");
        index
    }

    /// queue a spent record for a nullifier observed at `timestamp`
    pub fn queue_spent_record(&mut self, nullifier: Nullifier, timestamp: u64) -> u64 {
        let index = self.spent.len() as u64;
        self.spent.push(QueuedRecord {
            leaf: record_leaf(&nullifier.0, timestamp),
            timestamp,
        });
        debug!(index, timestamp, "queued spent record");
        index
    }

    /// total entries ever queued for a target
    pub fn len(&self, target: TreeTarget) -> u64 {
        match target {
            TreeTarget::Deposit => self.deposits.len() as u64,
            TreeTarget::UnspentRecord => self.unspent.len() as u64,
            TreeTarget::SpentRecord => self.spent.len() as u64,
        }
    }

    pub fn is_empty(&self, target: TreeTarget) -> bool {
        self.len(target) == 0
    }

    /// next index awaiting commitment for a target
    pub fn consumed(&self, target: TreeTarget) -> u64 {
        self.consumed[Self::slot(target)]
    }

    /// leaves for up to `count` entries starting at `start`, truncated
    /// at the queue tail - never fabricates entries
    pub fn fetch_queued(&self, target: TreeTarget, start: u64, count: u64) -> Vec<Hash> {
        let end = start.saturating_add(count).min(self.len(target));
        if start >= end {
            return Vec::new();
        }
        let range = start as usize..end as usize;
        match target {
            TreeTarget::Deposit => self.deposits[range]
                .iter()
                .map(|d| d.commitment.0)
                .collect(),
            TreeTarget::UnspentRecord => self.unspent[range].iter().map(|r| r.leaf).collect(),
            TreeTarget::SpentRecord => self.spent[range].iter().map(|r| r.leaf).collect(),
        }
    }

    /// queued deposit metadata, truncated at the tail
    pub fn fetch_queued_deposits(&self, start: u64, count: u64) -> &[QueuedDeposit] {
        let end = start.saturating_add(count).min(self.deposits.len() as u64);
        if start >= end {
            return &[];
        }
        &self.deposits[start as usize..end as usize]
    }

    /// validate and reserve a batch slice; returns its leaves
    ///
    /// the consumed pointer is NOT advanced here - that happens in
    /// `advance` once the ledger accepted the batch
    pub fn stage_batch(&self, target: TreeTarget, start: u64, batch_size: u64) -> Result<Vec<Hash>> {
        let consumed = self.consumed(target);
        if start != consumed {
            return Err(AnchorError::BatchOutOfOrder { start, consumed });
        }
        let available = self.len(target) - consumed;
        if available < batch_size {
            return Err(AnchorError::InsufficientQueue {
                requested: batch_size,
                available,
            });
        }
        Ok(self.fetch_queued(target, start, batch_size))
    }

    /// advance the consumed pointer after a committed batch
    pub fn advance(&mut self, target: TreeTarget, batch_size: u64) {
        self.consumed[Self::slot(target)] += batch_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use masp_pool::{Blinding, ChainId, MaspKey, NoteKey};

    fn commitment(n: u8) -> Commitment {
        Commitment([n; 32])
    }

    #[test]
    fn test_indices_are_monotonic_per_queue() {
        let mut queue = ProxyQueue::new();

        assert_eq!(queue.queue_unspent_record(commitment(1), 10), 0);
        assert_eq!(queue.queue_unspent_record(commitment(2), 11), 1);
        // independent counter per queue
        assert_eq!(queue.queue_spent_record(Nullifier([3u8; 32]), 12), 0);
        assert_eq!(queue.len(TreeTarget::UnspentRecord), 2);
        assert_eq!(queue.len(TreeTarget::SpentRecord), 1);
    }

    #[test]
    fn test_fetch_truncates_at_tail() {
        let mut queue = ProxyQueue::new();
        queue.queue_unspent_record(commitment(1), 10);
        queue.queue_unspent_record(commitment(2), 11);

        let fetched = queue.fetch_queued(TreeTarget::UnspentRecord, 0, 5);
        assert_eq!(fetched.len(), 2);
        assert!(queue.fetch_queued(TreeTarget::UnspentRecord, 2, 5).is_empty());

        // extreme ranges saturate instead of overflowing
        let fetched = queue.fetch_queued(TreeTarget::UnspentRecord, 1, u64::MAX);
        assert_eq!(fetched.len(), 1);
        assert!(queue
            .fetch_queued(TreeTarget::UnspentRecord, u64::MAX, u64::MAX)
            .is_empty());
        assert!(queue.fetch_queued_deposits(u64::MAX, u64::MAX).is_empty());
    }

    #[test]
    fn test_stage_requires_enough_entries() {
        let mut queue = ProxyQueue::new();
        queue.queue_unspent_record(commitment(1), 10);

        let err = queue
            .stage_batch(TreeTarget::UnspentRecord, 0, 4)
            .unwrap_err();
        assert_eq!(
            err,
            AnchorError::InsufficientQueue {
                requested: 4,
                available: 1
            }
        );
        assert!(err.is_retryable());
        // no side effects
        assert_eq!(queue.consumed(TreeTarget::UnspentRecord), 0);
    }

    #[test]
    fn test_stage_enforces_strict_order() {
        let mut queue = ProxyQueue::new();
        for n in 0..4u8 {
            queue.queue_unspent_record(commitment(n), 10);
        }

        assert_eq!(
            queue.stage_batch(TreeTarget::UnspentRecord, 2, 2),
            Err(AnchorError::BatchOutOfOrder {
                start: 2,
                consumed: 0
            })
        );

        queue.stage_batch(TreeTarget::UnspentRecord, 0, 2).unwrap();
        queue.advance(TreeTarget::UnspentRecord, 2);
        queue.stage_batch(TreeTarget::UnspentRecord, 2, 2).unwrap();
    }

    #[test]
    fn test_record_leaf_binds_timestamp() {
        let c = commitment(7);
        assert_ne!(record_leaf(&c.0, 100), record_leaf(&c.0, 101));
        assert_eq!(record_leaf(&c.0, 100), record_leaf(&c.0, 100));
    }

    #[test]
    fn test_deposit_from_utxo() {
        let key = MaspKey::from_phrase("test", "");
        let utxo = MaspUtxo::new(
            ChainId(1),
            NoteKey::Spending(key),
            AssetId(3),
            TokenId(5),
            Amount::new(100),
            Blinding([1u8; 32]),
        );

        let mut queue = ProxyQueue::new();
        let index = queue.queue_deposit_from_utxo(&utxo, false);
        assert_eq!(index, 0);

        let queued = &queue.fetch_queued_deposits(0, 1)[0];
        assert_eq!(queued.asset_type, AssetType::NonFungible);
        assert_eq!(queued.commitment, utxo.commitment());
        assert_eq!(queued.partial_commitment, utxo.partial_commitment());
        assert!(!queued.shielded);
    }
}
