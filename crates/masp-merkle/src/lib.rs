//! append-only merkle tree for shielded pool state
//!
//! fixed depth, dense indices from 0, root fully determined by the
//! ordered leaf sequence. no deletion, no reordering.

pub mod batch;
pub use batch::BatchWitness;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// domain separator for interior nodes
pub const MERKLE_DOMAIN: &[u8] = b"masp.merkle.node.v1";

pub type Hash = [u8; 32];

/// zero node used to pad incomplete levels
const ZERO: Hash = [0u8; 32];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// tree already holds 2^depth leaves
    #[error("tree capacity exceeded at depth {depth}")]
    CapacityExceeded { depth: usize },

    /// path requested for an index that was never inserted
    #[error("leaf index {index} not found (tree has {len} leaves)")]
    IndexNotFound { index: u64, len: u64 },

    /// batch sizes must be powers of two
    #[error("batch size {0} is not a power of two")]
    BatchSizeNotPowerOfTwo(usize),

    /// declared batch size must match the supplied leaves
    #[error("batch size {batch_size} does not match {leaves} leaves")]
    BatchSizeMismatch { batch_size: usize, leaves: usize },
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// merkle root
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Root(pub [u8; 32]);

impl Root {
    /// canonical empty-tree root, independent of depth
    pub const EMPTY: Self = Self([0u8; 32]);

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl AsRef<[u8]> for Root {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

pub fn is_power_of_two(n: usize) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

fn hash_siblings(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(MERKLE_DOMAIN);
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}

/// fold one level upward, padding odd lengths with the zero node
fn next_level(level: &[Hash]) -> Vec<Hash> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    for chunk in level.chunks(2) {
        next.push(hash_siblings(&chunk[0], chunk.get(1).unwrap_or(&ZERO)));
    }
    next
}

/// root of an ordered leaf sequence at a given depth
pub(crate) fn compute_root(leaves: &[Hash], depth: usize) -> Root {
    if leaves.is_empty() {
        return Root::EMPTY;
    }

    let mut level = leaves.to_vec();
    for _ in 0..depth {
        level = next_level(&level);
    }
    Root(level[0])
}

/// authentication path from a leaf to the root
///
/// `bits[i]` is true when the leaf-side node is the right child at
/// level i (sibling on the left); false means the sibling sits on the
/// right-hand side
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    pub siblings: Vec<Hash>,
    pub bits: Vec<bool>,
}

impl MerklePath {
    /// recombine the path with a leaf and compare against a root
    pub fn verify(&self, leaf: &Hash, root: &Root) -> bool {
        let mut current = *leaf;
        for (sibling, bit) in self.siblings.iter().zip(&self.bits) {
            current = if *bit {
                hash_siblings(sibling, &current)
            } else {
                hash_siblings(&current, sibling)
            };
        }
        current == root.0
    }

    /// the integer leaf index encoded by the path bits
    pub fn path_index(&self) -> u64 {
        self.bits
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, bit)| acc | (u64::from(*bit) << i))
    }
}

/// append-only merkle tree of fixed depth
#[derive(Clone, Debug)]
pub struct AppendTree {
    depth: usize,
    leaves: Vec<Hash>,
}

impl AppendTree {
    /// standard depth used by the pool trees
    pub const DEFAULT_DEPTH: usize = 30;

    /// create an empty tree; depth bounds capacity at 2^depth leaves
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            leaves: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn leaves(&self) -> &[Hash] {
        &self.leaves
    }

    /// append a single leaf and return its dense index
    pub fn insert(&mut self, leaf: Hash) -> Result<u64> {
        if self.len() == self.capacity() {
            return Err(TreeError::CapacityExceeded { depth: self.depth });
        }
        let index = self.len();
        self.leaves.push(leaf);
        Ok(index)
    }

    /// current root over all inserted leaves
    pub fn root(&self) -> Root {
        compute_root(&self.leaves, self.depth)
    }

    /// authentication path for a previously inserted leaf
    pub fn path_to(&self, index: u64) -> Result<MerklePath> {
        if index >= self.len() {
            return Err(TreeError::IndexNotFound {
                index,
                len: self.len(),
            });
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut bits = Vec::with_capacity(self.depth);
        let mut level = self.leaves.clone();
        let mut pos = index as usize;

        for _ in 0..self.depth {
            let is_right = pos % 2 == 1;
            let sibling_pos = if is_right { pos - 1 } else { pos + 1 };
            siblings.push(level.get(sibling_pos).copied().unwrap_or(ZERO));
            bits.push(is_right);

            level = next_level(&level);
            pos /= 2;
        }

        Ok(MerklePath { siblings, bits })
    }
}
