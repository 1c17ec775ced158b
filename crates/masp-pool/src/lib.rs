//! masp note model
//!
//! utxo-style secret notes for a multi-asset shielded pool
//!
//! # architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  MULTI-ASSET SHIELDED POOL                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  note lifecycle                                              │
//! │  ├─ create: commitment published into deposit tree           │
//! │  ├─ anchor: index assigned once at tree insertion            │
//! │  └─ spend:  nullifier published, requires spending authority │
//! │                                                              │
//! │  reward lifecycle                                            │
//! │  ├─ unspent record: H(commitment, timestamp)                 │
//! │  └─ spent record:   H(nullifier, timestamp)                  │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod keys;
pub mod note;
pub mod padding;
pub mod reward_note;
pub mod value;

pub use error::{NoteError, Result};
pub use keys::{MaspKey, NoteKey, ProofAuthorizingKey};
pub use note::{Blinding, Commitment, MaspUtxo, Nullifier};
pub use padding::{pad_inputs, TxInput, LARGE_TX_INPUTS, SMALL_TX_INPUTS};
pub use reward_note::{RewardKey, RewardUtxo};
pub use value::{Amount, AssetId, ChainId, TokenId};

/// domain separator for note commitments
pub const NOTE_DOMAIN: &[u8] = b"masp.note.commitment.v1";
/// domain separator for partial commitments (asset-independent half)
pub const PARTIAL_DOMAIN: &[u8] = b"masp.note.partial.v1";
/// domain separator for nullifiers
pub const NULLIFIER_DOMAIN: &[u8] = b"masp.note.nullifier.v1";
/// domain separator for reward note commitments
pub const REWARD_NOTE_DOMAIN: &[u8] = b"masp.reward-note.commitment.v1";
