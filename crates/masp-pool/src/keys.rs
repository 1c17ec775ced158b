//! key hierarchy for the shielded pool
//!
//! a masp key is the root of spending authority for a note. its
//! proof-authorizing key is the public curve point (two field elements
//! ak_x, ak_y) that commitments and nullifiers bind to; the authorizing
//! secret never leaves this module.

/// masp keypair - root of spending authority
///
/// kept secret, long-lived, never mutated after creation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaspKey {
    /// 32-byte seed
    seed: [u8; 32],
}

impl MaspKey {
    /// create from seed bytes
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    /// create from fresh randomness
    pub fn random<R: rand::RngCore>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self { seed }
    }

    /// derive from mnemonic + password (bip39-style)
    pub fn from_phrase(phrase: &str, password: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"masp.spend-key.v1");
        hasher.update(phrase.as_bytes());
        hasher.update(password.as_bytes());
        Self {
            seed: *hasher.finalize().as_bytes(),
        }
    }

    /// the secret authorizing scalar
    fn authorizing_secret(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"masp.authorizing-secret.v1");
        hasher.update(&self.seed);
        *hasher.finalize().as_bytes()
    }

    /// derive the proof-authorizing public key (ak_x, ak_y)
    pub fn proof_authorizing_key(&self) -> ProofAuthorizingKey {
        let secret = self.authorizing_secret();

        let mut hx = blake3::Hasher::new();
        hx.update(b"masp.ak.x.v1");
        hx.update(&secret);

        let mut hy = blake3::Hasher::new();
        hy.update(b"masp.ak.y.v1");
        hy.update(&secret);

        ProofAuthorizingKey {
            x: *hx.finalize().as_bytes(),
            y: *hy.finalize().as_bytes(),
        }
    }
}

/// proof-authorizing public key - a curve point (ak_x, ak_y)
///
/// safe to share; cannot produce nullifiers on its own
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProofAuthorizingKey {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl ProofAuthorizingKey {
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.x);
        bytes[32..].copy_from_slice(&self.y);
        bytes
    }
}

/// ownership of a note: full spending authority or view-only
///
/// nullifier derivation on a view-only key fails - the circuit requires
/// the authorizing secret to be derivable
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoteKey {
    /// holds the authorizing secret; can derive nullifiers
    Spending(MaspKey),
    /// public half only; commitments verify but spends fail
    ViewOnly(ProofAuthorizingKey),
}

impl NoteKey {
    /// proof-authorizing key, available from either half
    pub fn proof_authorizing_key(&self) -> ProofAuthorizingKey {
        match self {
            NoteKey::Spending(key) => key.proof_authorizing_key(),
            NoteKey::ViewOnly(ak) => *ak,
        }
    }

    pub fn has_spending_authority(&self) -> bool {
        matches!(self, NoteKey::Spending(_))
    }
}
