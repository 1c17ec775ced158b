//! error taxonomy for anchor orchestration
//!
//! stale-root and insufficient-queue conditions are retryable after
//! re-fetching current state; everything else is terminal for the
//! operation that produced it.

use masp_pool::{AssetId, ChainId, NoteError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnchorError {
    /// batch requested before enough entries were queued
    #[error("insufficient queued entries: requested {requested}, available {available}")]
    InsufficientQueue { requested: u64, available: u64 },

    /// batches must start exactly at the queue's consumed pointer
    #[error("batch start {start} does not match consumed pointer {consumed}")]
    BatchOutOfOrder { start: u64, consumed: u64 },

    /// reward rate lookup miss
    #[error("asset {0:?} is not whitelisted for rewards")]
    UnknownAsset(AssetId),

    /// operation referenced an unregistered edge
    #[error("chain {0:?} is not a registered edge")]
    UnknownEdge(ChainId),

    /// registry already holds the maximum number of linked chains
    #[error("edge limit reached ({0} slots)")]
    EdgeLimitReached(usize),

    #[error("chain {0:?} is already a registered edge")]
    DuplicateEdge(ChainId),

    /// referenced root was evicted from the bounded history
    #[error("referenced root is no longer in the registry history")]
    StaleRoot,

    /// reward nullifier already consumed by a settled claim
    #[error("reward nullifier already settled")]
    ReplaySettlement,

    /// proving or post-prove verification failure; for well-formed
    /// inputs this indicates an internal consistency bug
    #[error("proof backend failure: {0}")]
    ProofBackend(String),

    /// the external authority reverted for a reason outside the known
    /// taxonomy; the raw reason is logged, not surfaced
    #[error("ledger rejected the transaction")]
    LedgerRejection,

    /// membership path does not recombine to any accepted root
    #[error("membership path does not recombine to the claimed root")]
    InvalidMembershipPath,

    #[error("spent timestamp {spent} precedes unspent timestamp {unspent}")]
    InvalidRewardWindow { unspent: u64, spent: u64 },

    #[error("reward points computation overflowed")]
    RewardOverflow,

    #[error(transparent)]
    Note(#[from] NoteError),

    #[error(transparent)]
    Tree(#[from] masp_merkle::TreeError),
}

impl AnchorError {
    /// whether re-fetching current state and retrying can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnchorError::StaleRoot | AnchorError::InsufficientQueue { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnchorError>;
