//! batch insertion witnesses
//!
//! a batch relayer appends 2^k queued leaves in one provable step. the
//! witness describes the old-root -> new-root transition plus the path
//! indices of the first inserted leaf; the external proof backend turns
//! it into a succinct batch-insertion proof.
//!
//! staging is a pure simulation: the tree mutates only in `apply_batch`,
//! after the ledger has accepted the proof, so a cancelled proving
//! round-trip leaves no partially consumed state behind.

use serde::{Deserialize, Serialize};

use crate::{compute_root, is_power_of_two, AppendTree, Hash, Result, Root, TreeError};

/// structured witness for one contiguous power-of-two batch append
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWitness {
    /// root before the batch
    pub old_root: Root,
    /// root after appending all leaves contiguously
    pub new_root: Root,
    /// dense index assigned to the first leaf of the batch
    pub first_leaf_index: u64,
    /// path bits of the first leaf in the post-insertion tree
    pub path_bits: Vec<bool>,
    /// the batch leaves, in insertion order
    pub leaves: Vec<Hash>,
}

impl AppendTree {
    /// assemble the witness for appending `leaves` as one batch
    ///
    /// `batch_size` must be a power of two and equal `leaves.len()` -
    /// short batches are a caller error, never padded with zero leaves,
    /// since that would shift real indices
    pub fn stage_batch(&self, batch_size: usize, leaves: &[Hash]) -> Result<BatchWitness> {
        if !is_power_of_two(batch_size) {
            return Err(TreeError::BatchSizeNotPowerOfTwo(batch_size));
        }
        if batch_size != leaves.len() {
            return Err(TreeError::BatchSizeMismatch {
                batch_size,
                leaves: leaves.len(),
            });
        }
        if self.len() + batch_size as u64 > self.capacity() {
            return Err(TreeError::CapacityExceeded { depth: self.depth() });
        }

        let first_leaf_index = self.len();
        let old_root = self.root();

        let mut extended = self.leaves().to_vec();
        extended.extend_from_slice(leaves);
        let new_root = compute_root(&extended, self.depth());

        let path_bits = (0..self.depth())
            .map(|level| (first_leaf_index >> level) & 1 == 1)
            .collect();

        Ok(BatchWitness {
            old_root,
            new_root,
            first_leaf_index,
            path_bits,
            leaves: leaves.to_vec(),
        })
    }

    /// append a previously staged batch; returns the first leaf index
    pub fn apply_batch(&mut self, leaves: &[Hash]) -> Result<u64> {
        if self.len() + leaves.len() as u64 > self.capacity() {
            return Err(TreeError::CapacityExceeded { depth: self.depth() });
        }
        let first = self.len();
        for leaf in leaves {
            self.insert(*leaf)?;
        }
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> Hash {
        [n; 32]
    }

    #[test]
    fn test_stage_then_apply() {
        let mut tree = AppendTree::new(8);
        tree.insert(leaf(1)).unwrap();

        let batch: Vec<Hash> = (10..14u8).map(leaf).collect();
        let witness = tree.stage_batch(4, &batch).unwrap();

        assert_eq!(witness.old_root, tree.root());
        assert_eq!(witness.first_leaf_index, 1);
        assert_eq!(witness.leaves, batch);
        // staging never mutates
        assert_eq!(tree.len(), 1);

        let first = tree.apply_batch(&batch).unwrap();
        assert_eq!(first, 1);
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.root(), witness.new_root);
    }

    #[test]
    fn test_batch_size_must_be_power_of_two() {
        let tree = AppendTree::new(8);
        let batch: Vec<Hash> = (0..3u8).map(leaf).collect();
        assert_eq!(
            tree.stage_batch(3, &batch),
            Err(TreeError::BatchSizeNotPowerOfTwo(3))
        );
    }

    #[test]
    fn test_batch_size_mismatch() {
        let tree = AppendTree::new(8);
        let batch: Vec<Hash> = (0..2u8).map(leaf).collect();
        assert_eq!(
            tree.stage_batch(4, &batch),
            Err(TreeError::BatchSizeMismatch {
                batch_size: 4,
                leaves: 2
            })
        );
    }

    #[test]
    fn test_batch_over_capacity() {
        let mut tree = AppendTree::new(2);
        tree.insert(leaf(0)).unwrap();
        let batch: Vec<Hash> = (1..5u8).map(leaf).collect();
        assert_eq!(
            tree.stage_batch(4, &batch),
            Err(TreeError::CapacityExceeded { depth: 2 })
        );
    }

    #[test]
    fn test_path_bits_encode_first_index() {
        let mut tree = AppendTree::new(6);
        for n in 0..4u8 {
            tree.insert(leaf(n)).unwrap();
        }

        let batch: Vec<Hash> = (10..14u8).map(leaf).collect();
        let witness = tree.stage_batch(4, &batch).unwrap();
        assert_eq!(witness.first_leaf_index, 4);
        // 4 = 0b100, little-endian bits
        assert_eq!(
            witness.path_bits,
            vec![false, false, true, false, false, false]
        );
    }

    #[test]
    fn test_batch_matches_sequential_inserts() {
        let batch: Vec<Hash> = (0..8u8).map(leaf).collect();

        let mut sequential = AppendTree::new(8);
        for l in &batch {
            sequential.insert(*l).unwrap();
        }

        let empty = AppendTree::new(8);
        let witness = empty.stage_batch(8, &batch).unwrap();
        assert_eq!(witness.old_root, Root::EMPTY);
        assert_eq!(witness.new_root, sequential.root());
    }
}
