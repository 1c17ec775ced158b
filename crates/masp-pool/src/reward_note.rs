//! reward notes
//!
//! simplified note variant for the mining-reward ledger. its nullifier
//! incorporates the owning masp note's proof-authorizing key, binding a
//! reward claim to one specific spending note.

use crate::error::{NoteError, Result};
use crate::keys::ProofAuthorizingKey;
use crate::note::{Blinding, Commitment, Nullifier};
use crate::value::{Amount, ChainId};
use crate::{NULLIFIER_DOMAIN, REWARD_NOTE_DOMAIN};

/// keypair for reward notes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardKey {
    secret: [u8; 32],
}

impl RewardKey {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { secret: seed }
    }

    pub fn random<R: rand::RngCore>(rng: &mut R) -> Self {
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut secret);
        Self { secret }
    }

    /// public key used inside the reward commitment
    pub fn public_key(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"masp.reward-key.pub.v1");
        hasher.update(&self.secret);
        *hasher.finalize().as_bytes()
    }
}

/// a reward ledger note
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardUtxo {
    pub chain_id: ChainId,
    pub amount: Amount,
    pub key: RewardKey,
    pub blinding: Blinding,
    /// position in the reward tree; None until anchored
    index: Option<u64>,
}

impl RewardUtxo {
    pub fn new(chain_id: ChainId, amount: Amount, key: RewardKey, blinding: Blinding) -> Self {
        Self {
            chain_id,
            amount,
            key,
            blinding,
            index: None,
        }
    }

    /// H(chain, amount, pubkey, blinding)
    pub fn commitment(&self) -> Commitment {
        let mut hasher = blake3::Hasher::new();
        hasher.update(REWARD_NOTE_DOMAIN);
        hasher.update(&self.chain_id.to_bytes());
        hasher.update(&self.amount.to_bytes());
        hasher.update(&self.key.public_key());
        hasher.update(&self.blinding.0);
        Commitment(*hasher.finalize().as_bytes())
    }

    /// the anchored position, if any
    pub fn anchored_index(&self) -> Option<u64> {
        self.index
    }

    /// set the reward-tree index - exactly once, at insertion time
    pub fn set_index(&mut self, index: u64) -> Result<()> {
        if let Some(existing) = self.index {
            return Err(NoteError::IndexAlreadySet(existing));
        }
        self.index = Some(index);
        Ok(())
    }

    /// nullifier bound to the owning masp note's authorizing key
    pub fn nullifier(&self, owner_ak: &ProofAuthorizingKey) -> Nullifier {
        let mut hasher = blake3::Hasher::new();
        hasher.update(NULLIFIER_DOMAIN);
        hasher.update(&owner_ak.x);
        hasher.update(&owner_ak.y);
        hasher.update(&self.commitment().0);
        Nullifier(*hasher.finalize().as_bytes())
    }
}
