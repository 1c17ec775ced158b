//! dummy notes for fixed-size circuit shapes
//!
//! transaction circuits take exactly 2 or 16 inputs; missing slots are
//! filled with zero-amount dummy notes that have well-formed commitments
//! and nullifiers but no economic meaning. modeling them as a tagged
//! variant keeps business logic from ever treating padding as value.

use crate::error::Result;
use crate::keys::{MaspKey, NoteKey};
use crate::note::{Blinding, Commitment, MaspUtxo, Nullifier};
use crate::value::{Amount, AssetId, ChainId, TokenId};

/// small transaction shape: 2 inputs
pub const SMALL_TX_INPUTS: usize = 2;
/// large transaction shape: 16 inputs
pub const LARGE_TX_INPUTS: usize = 16;

/// a circuit input slot: a real note or economically-void padding
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxInput {
    Real(MaspUtxo),
    Padding(MaspUtxo),
}

impl TxInput {
    /// the underlying note, real or padding
    pub fn note(&self) -> &MaspUtxo {
        match self {
            TxInput::Real(note) | TxInput::Padding(note) => note,
        }
    }

    pub fn is_padding(&self) -> bool {
        matches!(self, TxInput::Padding(_))
    }

    pub fn commitment(&self) -> Commitment {
        self.note().commitment()
    }

    pub fn nullifier(&self) -> Result<Nullifier> {
        self.note().nullifier()
    }

    /// value carried by this slot; padding is always zero
    pub fn amount(&self) -> Amount {
        match self {
            TxInput::Real(note) => note.amount,
            TxInput::Padding(_) => Amount::ZERO,
        }
    }
}

/// pad an input array to a fixed circuit shape with dummy notes
///
/// dummies reuse the first real input's key so their nullifiers are
/// well-formed under the same authority; with no real inputs a fresh
/// key is generated. dummy indices are pinned to 0 - they are never
/// anchored but the circuit expects a path index placeholder.
pub fn pad_inputs<R: rand::RngCore>(
    mut inputs: Vec<TxInput>,
    target_len: usize,
    chain_id: ChainId,
    asset_id: AssetId,
    token_id: TokenId,
    rng: &mut R,
) -> Vec<TxInput> {
    let dummy_key = inputs
        .first()
        .map(|input| input.note().key.clone())
        .unwrap_or_else(|| NoteKey::Spending(MaspKey::random(rng)));

    while inputs.len() < target_len {
        let mut dummy = MaspUtxo::new(
            chain_id,
            dummy_key.clone(),
            asset_id,
            token_id,
            Amount::ZERO,
            Blinding::random(rng),
        );
        dummy.force_index_zero();
        inputs.push(TxInput::Padding(dummy));
    }

    inputs
}
