//! shielded notes (masp utxos)
//!
//! a note represents one unit of value committed into the deposit tree.
//! the commitment is a binding, hiding hash of its contents; the
//! nullifier marks it spent and requires spending authority.

use serde::{Deserialize, Serialize};

use crate::error::{NoteError, Result};
use crate::keys::NoteKey;
use crate::value::{Amount, AssetId, ChainId, TokenId};
use crate::{NOTE_DOMAIN, NULLIFIER_DOMAIN, PARTIAL_DOMAIN};

/// random blinding factor for hiding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Blinding(pub [u8; 32]);

impl Blinding {
    pub fn random<R: rand::RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// commitment to a note (what goes in the deposit tree)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// nullifier - unique identifier for a spent note
///
/// publishing it prevents reuse; deriving it requires the note's
/// authorizing secret
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nullifier(pub [u8; 32]);

impl Nullifier {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Nullifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// a shielded note (the "utxo")
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaspUtxo {
    /// origin chain
    pub chain_id: ChainId,
    /// owning key (spending or view-only)
    pub key: NoteKey,
    /// asset this note carries
    pub asset_id: AssetId,
    /// token within the asset (zero = fungible)
    pub token_id: TokenId,
    /// value stored in this note
    pub amount: Amount,
    /// random blinding factor
    pub blinding: Blinding,
    /// position in the deposit tree; None until anchored
    index: Option<u64>,
}

impl MaspUtxo {
    /// create a new, not-yet-anchored note
    pub fn new(
        chain_id: ChainId,
        key: NoteKey,
        asset_id: AssetId,
        token_id: TokenId,
        amount: Amount,
        blinding: Blinding,
    ) -> Self {
        Self {
            chain_id,
            key,
            asset_id,
            token_id,
            amount,
            blinding,
            index: None,
        }
    }

    /// compute the note commitment
    ///
    /// H(chain, asset, token, amount, ak_x, ak_y, blinding) - pure and
    /// stable for the lifetime of the note
    pub fn commitment(&self) -> Commitment {
        let ak = self.key.proof_authorizing_key();
        let mut hasher = blake3::Hasher::new();
        hasher.update(NOTE_DOMAIN);
        hasher.update(&self.chain_id.to_bytes());
        hasher.update(&self.asset_id.to_bytes());
        hasher.update(&self.token_id.to_bytes());
        hasher.update(&self.amount.to_bytes());
        hasher.update(&ak.x);
        hasher.update(&ak.y);
        hasher.update(&self.blinding.0);
        Commitment(*hasher.finalize().as_bytes())
    }

    /// asset-independent half of the commitment, carried in the deposit
    /// queue so a deposit can be re-bound to its wrapped asset later
    pub fn partial_commitment(&self) -> Commitment {
        let ak = self.key.proof_authorizing_key();
        let mut hasher = blake3::Hasher::new();
        hasher.update(PARTIAL_DOMAIN);
        hasher.update(&self.chain_id.to_bytes());
        hasher.update(&self.amount.to_bytes());
        hasher.update(&ak.x);
        hasher.update(&ak.y);
        hasher.update(&self.blinding.0);
        Commitment(*hasher.finalize().as_bytes())
    }

    /// derive the nullifier: H(ak_x, ak_y, commitment)
    ///
    /// fails unless the owning key holds spending authority
    pub fn nullifier(&self) -> Result<Nullifier> {
        if !self.key.has_spending_authority() {
            return Err(NoteError::MissingAuthority);
        }
        let ak = self.key.proof_authorizing_key();
        let mut hasher = blake3::Hasher::new();
        hasher.update(NULLIFIER_DOMAIN);
        hasher.update(&ak.x);
        hasher.update(&ak.y);
        hasher.update(&self.commitment().0);
        Ok(Nullifier(*hasher.finalize().as_bytes()))
    }

    /// tree position, or -1 while unanchored (circuit placeholder shape)
    pub fn index(&self) -> i64 {
        self.index.map_or(-1, |i| i as i64)
    }

    /// the anchored position, if any
    pub fn anchored_index(&self) -> Option<u64> {
        self.index
    }

    /// set the tree index - exactly once, at insertion time
    pub fn set_index(&mut self, index: u64) -> Result<()> {
        if let Some(existing) = self.index {
            return Err(NoteError::IndexAlreadySet(existing));
        }
        self.index = Some(index);
        Ok(())
    }

    /// force the index placeholder on a padding note
    ///
    /// padding notes are never anchored but the circuit still expects a
    /// path index, so it is pinned to 0
    pub(crate) fn force_index_zero(&mut self) {
        self.index = Some(0);
    }

    /// encode the private note fields for witness construction
    pub fn to_bytes(&self) -> Vec<u8> {
        let ak = self.key.proof_authorizing_key();
        let mut bytes = Vec::with_capacity(8 * 3 + 16 + 64 + 32);
        bytes.extend_from_slice(&self.chain_id.to_bytes());
        bytes.extend_from_slice(&self.asset_id.to_bytes());
        bytes.extend_from_slice(&self.token_id.to_bytes());
        bytes.extend_from_slice(&self.amount.to_bytes());
        bytes.extend_from_slice(&ak.to_bytes());
        bytes.extend_from_slice(&self.blinding.0);
        bytes
    }
}
