//! masp anchor orchestration
//!
//! off-chain coordination for a multi-asset shielded pool: the proxy
//! queue that buffers commitments until a provable batch exists, the
//! cross-chain edge/root registry, and the anonymity-mining reward
//! engine. proving and final state advancement live behind the
//! [`ProofBackend`] and [`LedgerAuthority`] seams.
//!
//! # data flow
//!
//! ```text
//! notes ──commitments──► proxy queue ──2^k batch──► batch witness
//!                                                        │
//!                       proof backend ◄──────────────────┘
//!                            │ proof
//!                            ▼
//!                    ledger authority ──accept──► tree root advances
//!
//! reward claim: unspent leaf + spent leaf + registry root sets
//!               ──► sponge-hashed public inputs ──► prove ──► settle
//! ```

pub mod anchor;
pub mod backend;
pub mod error;
pub mod ledger;
pub mod queue;
pub mod registry;
pub mod reward;

pub use anchor::{AnchorConfig, CommittedBatch, MaspAnchor, SyncedState};
pub use backend::{BatchInsertInputs, MockProofBackend, ProofBackend, ProofBundle};
pub use error::{AnchorError, Result};
pub use ledger::{InMemoryLedger, LedgerAuthority, LedgerRevert, RewardPublicInputs};
pub use queue::{record_leaf, AssetType, ProxyQueue, QueuedDeposit, QueuedRecord, TreeTarget};
pub use registry::{EdgeRegistry, TreeKind};
pub use reward::{
    public_input_hash, reward_nullifier, reward_points, ClaimState, ExtData, RewardClaim,
    RewardClaimInputs, RewardEngine, RewardRates, RewardSwap,
};

/// domain separator for unspent/spent record leaves H(value, timestamp)
pub const RECORD_DOMAIN: &[u8] = b"masp.record.leaf.v1";
/// domain separator for reward nullifiers H(note nullifier, path index)
pub const REWARD_NULLIFIER_DOMAIN: &[u8] = b"masp.reward.nullifier.v1";
/// domain separator for the sponge-hashed reward public inputs
pub const REWARD_INPUTS_DOMAIN: &[u8] = b"masp.reward.public-inputs.v1";
/// domain separator for reward external data (fee/recipient/relayer)
pub const EXT_DATA_DOMAIN: &[u8] = b"masp.reward.ext-data.v1";
/// domain separator for batch insertion argument hashes
pub const BATCH_ARGS_DOMAIN: &[u8] = b"masp.batch.args.v1";
