//! settlement ledger boundary
//!
//! the anchor never trusts its own view of on-chain state: every batch
//! and reward submission goes through [`LedgerAuthority`] and the
//! ledger's accept/revert answer is the only source of truth. reverts
//! come back as opaque reason strings which are classified here into
//! the typed error taxonomy; raw reasons are logged, never surfaced.

use std::collections::HashSet;

use tracing::warn;

use masp_merkle::{BatchWitness, Root};
use masp_pool::Nullifier;

use crate::backend::ProofBundle;
use crate::error::AnchorError;
use crate::queue::TreeTarget;

/// a rejected submission, carrying the ledger's raw reason string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerRevert(pub String);

impl LedgerRevert {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// public inputs the ledger checks against a reward proof
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardPublicInputs {
    pub anonymity_points: u128,
    pub reward_nullifier: Nullifier,
    pub ext_data_hash: [u8; 32],
    pub spent_roots: Vec<Root>,
    pub unspent_roots: Vec<Root>,
    pub public_input_hash: [u8; 32],
}

/// the settlement authority every mutation must clear
pub trait LedgerAuthority {
    /// submit a proven batch insertion for one of the trees
    fn submit_batch(
        &mut self,
        target: TreeTarget,
        proof: &ProofBundle,
        witness: &BatchWitness,
    ) -> std::result::Result<(), LedgerRevert>;

    /// submit a proven reward claim
    fn submit_reward(
        &mut self,
        proof: &ProofBundle,
        public: &RewardPublicInputs,
    ) -> std::result::Result<(), LedgerRevert>;
}

pub(crate) const REVERT_REWARD_SPENT: &str = "Reward has been already spent";
pub(crate) const REVERT_BATCH_OLD_ROOT: &str = "Invalid batch old root";

/// classify a revert reason into the typed taxonomy
///
/// the raw string stays in the logs; callers only ever see the typed
/// variant
pub(crate) fn map_revert(revert: LedgerRevert) -> AnchorError {
    if revert.0 == REVERT_REWARD_SPENT {
        return AnchorError::ReplaySettlement;
    }
    if revert.0.to_ascii_lowercase().contains("root") {
        return AnchorError::StaleRoot;
    }
    warn!(reason = %revert.0, "ledger rejected submission");
    AnchorError::LedgerRejection
}

/// in-process ledger double for tests and local runs
///
/// enforces the same acceptance rules a contract would: a batch must
/// extend the current root, a reward nullifier settles at most once
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    roots: [Root; 3],
    known_roots: HashSet<Root>,
    settled: HashSet<Nullifier>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            roots: [Root::EMPTY; 3],
            known_roots: HashSet::new(),
            settled: HashSet::new(),
        }
    }

    pub fn current_root(&self, target: TreeTarget) -> Root {
        self.roots[target as usize]
    }

    /// mark a root as acceptable for reward membership checks
    pub fn register_root(&mut self, root: Root) {
        self.known_roots.insert(root);
    }

    pub fn is_settled(&self, nullifier: &Nullifier) -> bool {
        self.settled.contains(nullifier)
    }
}

impl LedgerAuthority for InMemoryLedger {
    fn submit_batch(
        &mut self,
        target: TreeTarget,
        _proof: &ProofBundle,
        witness: &BatchWitness,
    ) -> std::result::Result<(), LedgerRevert> {
        let current = self.roots[target as usize];
        if witness.old_root != current {
            return Err(LedgerRevert::new(REVERT_BATCH_OLD_ROOT));
        }
        self.roots[target as usize] = witness.new_root;
        self.known_roots.insert(witness.new_root);
        Ok(())
    }

    fn submit_reward(
        &mut self,
        _proof: &ProofBundle,
        public: &RewardPublicInputs,
    ) -> std::result::Result<(), LedgerRevert> {
        if self.settled.contains(&public.reward_nullifier) {
            return Err(LedgerRevert::new(REVERT_REWARD_SPENT));
        }
        let member = |roots: &[Root]| {
            roots
                .iter()
                .any(|r| !r.is_empty() && self.known_roots.contains(r))
        };
        if !member(&public.unspent_roots) || !member(&public.spent_roots) {
            return Err(LedgerRevert::new("Unknown membership root"));
        }
        self.settled.insert(public.reward_nullifier);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_revert_classification() {
        assert_eq!(
            map_revert(LedgerRevert::new(REVERT_REWARD_SPENT)),
            AnchorError::ReplaySettlement
        );
        assert_eq!(
            map_revert(LedgerRevert::new(REVERT_BATCH_OLD_ROOT)),
            AnchorError::StaleRoot
        );
        assert_eq!(
            map_revert(LedgerRevert::new("Unknown membership root")),
            AnchorError::StaleRoot
        );
        assert_eq!(
            map_revert(LedgerRevert::new("execution reverted")),
            AnchorError::LedgerRejection
        );
    }

    #[test]
    fn test_batch_must_extend_current_root() {
        let mut ledger = InMemoryLedger::new();
        let bundle = ProofBundle {
            proof: vec![],
            public_signals: vec![],
        };
        let witness = BatchWitness {
            old_root: Root::EMPTY,
            new_root: Root([1u8; 32]),
            first_leaf_index: 0,
            path_bits: vec![],
            leaves: vec![],
        };
        ledger
            .submit_batch(TreeTarget::Deposit, &bundle, &witness)
            .unwrap();
        assert_eq!(ledger.current_root(TreeTarget::Deposit), Root([1u8; 32]));

        // resubmitting the same witness no longer extends the tip
        let err = ledger
            .submit_batch(TreeTarget::Deposit, &bundle, &witness)
            .unwrap_err();
        assert_eq!(err, LedgerRevert::new(REVERT_BATCH_OLD_ROOT));
    }

    #[test]
    fn test_reward_settles_once() {
        let mut ledger = InMemoryLedger::new();
        let root = Root([7u8; 32]);
        ledger.register_root(root);

        let bundle = ProofBundle {
            proof: vec![],
            public_signals: vec![],
        };
        let public = RewardPublicInputs {
            anonymity_points: 10,
            reward_nullifier: Nullifier([9u8; 32]),
            ext_data_hash: [0u8; 32],
            spent_roots: vec![root],
            unspent_roots: vec![root],
            public_input_hash: [0u8; 32],
        };
        ledger.submit_reward(&bundle, &public).unwrap();
        assert!(ledger.is_settled(&public.reward_nullifier));

        let err = ledger.submit_reward(&bundle, &public).unwrap_err();
        assert_eq!(err, LedgerRevert::new(REVERT_REWARD_SPENT));
    }
}
