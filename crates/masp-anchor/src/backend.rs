//! proof backend seam
//!
//! the zero-knowledge circuits and their prover live outside this
//! crate. given a structured input record the backend returns a proof
//! and public signals, or deterministically rejects invalid inputs.
//! verification failure after a successful prove is an internal
//! consistency bug, surfaced as a fatal precondition violation.

use serde::{Deserialize, Serialize};

use masp_merkle::BatchWitness;

use crate::error::Result;
use crate::reward::RewardClaimInputs;

/// proof plus its public signals, as returned by the prover
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub proof: Vec<u8>,
    pub public_signals: Vec<[u8; 32]>,
}

/// structured inputs for a batch-insertion proof
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInsertInputs {
    /// sponge-folded public arguments
    pub args_hash: [u8; 32],
    /// old-root/new-root/path witness for the batch
    pub witness: BatchWitness,
    /// log2 of the batch size
    pub batch_height: u32,
}

/// opaque proving service
pub trait ProofBackend {
    fn prove_batch_insert(&self, inputs: &BatchInsertInputs) -> Result<ProofBundle>;

    fn prove_reward_claim(&self, inputs: &RewardClaimInputs) -> Result<ProofBundle>;

    fn verify(&self, public_signals: &[[u8; 32]], proof: &[u8]) -> bool;
}

/// deterministic stand-in prover for tests and dry runs
///
/// the "proof" is a transcript hash over the public signals, so
/// verification is a recomputation - no soundness, stable behavior
#[derive(Clone, Copy, Debug, Default)]
pub struct MockProofBackend;

const MOCK_PROOF_DOMAIN: &[u8] = b"masp.mock-proof.v1";

impl MockProofBackend {
    fn transcript(signals: &[[u8; 32]]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(MOCK_PROOF_DOMAIN);
        for signal in signals {
            hasher.update(signal);
        }
        *hasher.finalize().as_bytes()
    }
}

impl ProofBackend for MockProofBackend {
    fn prove_batch_insert(&self, inputs: &BatchInsertInputs) -> Result<ProofBundle> {
        let public_signals = vec![
            inputs.args_hash,
            inputs.witness.old_root.to_bytes(),
            inputs.witness.new_root.to_bytes(),
        ];
        Ok(ProofBundle {
            proof: Self::transcript(&public_signals).to_vec(),
            public_signals,
        })
    }

    fn prove_reward_claim(&self, inputs: &RewardClaimInputs) -> Result<ProofBundle> {
        let public_signals = vec![inputs.public_input_hash];
        Ok(ProofBundle {
            proof: Self::transcript(&public_signals).to_vec(),
            public_signals,
        })
    }

    fn verify(&self, public_signals: &[[u8; 32]], proof: &[u8]) -> bool {
        proof == Self::transcript(public_signals)
    }
}
