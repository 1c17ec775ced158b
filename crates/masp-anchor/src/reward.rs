//! anonymity-mining reward engine
//!
//! points accrue for the time a note stayed unlinkable between its
//! unspent record and its spent record:
//!
//! `points = amount * rate(asset) * (spent_ts - unspent_ts)`
//!
//! the reward nullifier H(note nullifier, note path index) binds one
//! claim per distinct spent note at a distinct tree position; repeated
//! claims produce the identical nullifier so the ledger can reject the
//! replay. all external-facing parameters fold into a single
//! sponge-hashed scalar handed to the proof backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use masp_merkle::{MerklePath, Root};
use masp_pool::{Amount, AssetId, ChainId, MaspUtxo, Nullifier, TokenId};

use crate::backend::ProofBackend;
use crate::error::{AnchorError, Result};
use crate::ledger::{map_revert, LedgerAuthority, RewardPublicInputs};
use crate::queue::record_leaf;
use crate::registry::{EdgeRegistry, TreeKind};
use crate::{EXT_DATA_DOMAIN, REWARD_INPUTS_DOMAIN, REWARD_NULLIFIER_DOMAIN};

/// per-asset whitelist of reward rates
///
/// assets outside the table earn nothing and fail rate lookup
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewardRates {
    table: BTreeMap<AssetId, u64>,
}

impl RewardRates {
    pub fn new(pairs: impl IntoIterator<Item = (AssetId, u64)>) -> Self {
        Self {
            table: pairs.into_iter().collect(),
        }
    }

    /// rate for a whitelisted asset
    pub fn rate(&self, asset_id: AssetId) -> Result<u64> {
        self.table
            .get(&asset_id)
            .copied()
            .ok_or(AnchorError::UnknownAsset(asset_id))
    }

    /// whitelisted asset ids in canonical (sorted) order
    pub fn whitelisted_ids(&self) -> Vec<AssetId> {
        self.table.keys().copied().collect()
    }

    /// rates aligned with `whitelisted_ids`
    pub fn rates(&self) -> Vec<u64> {
        self.table.values().copied().collect()
    }

    /// replace the whitelist (governance operation)
    pub fn update(&mut self, pairs: impl IntoIterator<Item = (AssetId, u64)>) {
        self.table = pairs.into_iter().collect();
    }
}

/// external data bound into a claim: fee split and payout addresses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtData {
    pub fee: Amount,
    pub recipient: [u8; 32],
    pub relayer: [u8; 32],
}

impl ExtData {
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(EXT_DATA_DOMAIN);
        hasher.update(&self.fee.to_bytes());
        hasher.update(&self.recipient);
        hasher.update(&self.relayer);
        *hasher.finalize().as_bytes()
    }
}

/// time-and-amount-weighted anonymity points
///
/// strictly linear: larger amounts and longer unlinkability windows
/// yield proportionally more points
pub fn reward_points(
    amount: Amount,
    rate: u64,
    unspent_timestamp: u64,
    spent_timestamp: u64,
) -> Result<u128> {
    if spent_timestamp < unspent_timestamp {
        return Err(AnchorError::InvalidRewardWindow {
            unspent: unspent_timestamp,
            spent: spent_timestamp,
        });
    }
    let window = (spent_timestamp - unspent_timestamp) as u128;
    amount
        .0
        .checked_mul(rate as u128)
        .and_then(|p| p.checked_mul(window))
        .ok_or(AnchorError::RewardOverflow)
}

/// H(note nullifier, note path index) - one claim per spent note at a
/// distinct tree position, reproducible for replay detection
pub fn reward_nullifier(note_nullifier: &Nullifier, note_path_index: u64) -> Nullifier {
    let mut hasher = blake3::Hasher::new();
    hasher.update(REWARD_NULLIFIER_DOMAIN);
    hasher.update(&note_nullifier.0);
    hasher.update(&note_path_index.to_be_bytes());
    Nullifier(*hasher.finalize().as_bytes())
}

/// fold all external-facing claim parameters into one scalar
///
/// public-input compression only - the ordering (whitelist, rates,
/// spent roots, unspent roots, points, nullifier, ext data) is part of
/// the circuit contract
pub fn public_input_hash(
    rates: &RewardRates,
    spent_roots: &[Root],
    unspent_roots: &[Root],
    points: u128,
    reward_nullifier: &Nullifier,
    ext_data_hash: &[u8; 32],
) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(REWARD_INPUTS_DOMAIN);
    for id in rates.whitelisted_ids() {
        hasher.update(&id.to_bytes());
    }
    for rate in rates.rates() {
        hasher.update(&rate.to_be_bytes());
    }
    for root in spent_roots {
        hasher.update(&root.0);
    }
    for root in unspent_roots {
        hasher.update(&root.0);
    }
    hasher.update(&points.to_be_bytes());
    hasher.update(&reward_nullifier.0);
    hasher.update(ext_data_hash);
    *hasher.finalize().as_bytes()
}

/// full structured input record for the reward circuit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardClaimInputs {
    pub rate: u64,
    pub anonymity_points: u128,
    pub reward_nullifier: Nullifier,
    pub ext_data_hash: [u8; 32],

    // the spent masp note the claim is for
    pub note_chain_id: ChainId,
    pub note_amount: Amount,
    pub note_asset_id: AssetId,
    pub note_token_id: TokenId,
    pub note_ak_x: [u8; 32],
    pub note_ak_y: [u8; 32],
    pub note_blinding: [u8; 32],
    pub note_path_index: u64,

    // unspent record membership
    pub unspent_timestamp: u64,
    pub unspent_roots: Vec<Root>,
    pub unspent_path: MerklePath,

    // spent record membership
    pub spent_timestamp: u64,
    pub spent_roots: Vec<Root>,
    pub spent_path: MerklePath,

    /// sponge-folded scalar the verifier checks
    pub public_input_hash: [u8; 32],
}

/// claim lifecycle: `Unclaimed -> Proven -> Settled`, terminal
/// `Rejected` on invalid path, stale root, or replayed nullifier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimState {
    Unclaimed,
    Proven,
    Settled,
    Rejected,
}

/// an assembled reward claim moving through the proof pipeline
#[derive(Clone, Debug)]
pub struct RewardClaim {
    pub inputs: RewardClaimInputs,
    state: ClaimState,
}

impl RewardClaim {
    pub fn state(&self) -> ClaimState {
        self.state
    }

    pub fn reward_nullifier(&self) -> Nullifier {
        self.inputs.reward_nullifier
    }

    pub fn anonymity_points(&self) -> u128 {
        self.inputs.anonymity_points
    }
}

/// external bonding-curve swap converting points into payout tokens
///
/// `payout = balance - balance * exp(-points / pool_weight)`, computed
/// by the swap ledger in fixed high-precision arithmetic; exposed here
/// only as a quote
pub trait RewardSwap {
    fn quote_payout(&self, points: u128) -> Amount;
}

/// assembles and settles anonymity reward claims
#[derive(Clone, Debug, Default)]
pub struct RewardEngine {
    rates: RewardRates,
}

impl RewardEngine {
    pub fn new(rates: RewardRates) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &RewardRates {
        &self.rates
    }

    pub fn set_rates(&mut self, rates: RewardRates) {
        self.rates = rates;
    }

    /// build the deterministic claim record for a spent note
    ///
    /// membership paths are validated locally against the supplied root
    /// sets before any proving cost is paid; the resulting inputs are a
    /// pure function of their arguments, so a repeated claim for the
    /// same note and path index reproduces the identical nullifier
    #[allow(clippy::too_many_arguments)]
    pub fn assemble_claim(
        &self,
        note: &MaspUtxo,
        note_path_index: u64,
        unspent_timestamp: u64,
        unspent_path: MerklePath,
        unspent_roots: Vec<Root>,
        spent_timestamp: u64,
        spent_path: MerklePath,
        spent_roots: Vec<Root>,
        ext_data: ExtData,
    ) -> Result<RewardClaim> {
        let rate = self.rates.rate(note.asset_id)?;
        let note_nullifier = note.nullifier()?;
        let points = reward_points(note.amount, rate, unspent_timestamp, spent_timestamp)?;

        let unspent_leaf = record_leaf(&note.commitment().0, unspent_timestamp);
        if !member_of_any(&unspent_path, &unspent_leaf, &unspent_roots) {
            return Err(AnchorError::InvalidMembershipPath);
        }
        let spent_leaf = record_leaf(&note_nullifier.0, spent_timestamp);
        if !member_of_any(&spent_path, &spent_leaf, &spent_roots) {
            return Err(AnchorError::InvalidMembershipPath);
        }

        let rn = reward_nullifier(&note_nullifier, note_path_index);
        let ext_data_hash = ext_data.hash();
        let pih = public_input_hash(
            &self.rates,
            &spent_roots,
            &unspent_roots,
            points,
            &rn,
            &ext_data_hash,
        );

        let ak = note.key.proof_authorizing_key();
        debug!(points, nullifier = %hex::encode(rn.0), "assembled reward claim");

        Ok(RewardClaim {
            inputs: RewardClaimInputs {
                rate,
                anonymity_points: points,
                reward_nullifier: rn,
                ext_data_hash,
                note_chain_id: note.chain_id,
                note_amount: note.amount,
                note_asset_id: note.asset_id,
                note_token_id: note.token_id,
                note_ak_x: ak.x,
                note_ak_y: ak.y,
                note_blinding: note.blinding.0,
                note_path_index,
                unspent_timestamp,
                unspent_roots,
                unspent_path,
                spent_timestamp,
                spent_roots,
                spent_path,
                public_input_hash: pih,
            },
            state: ClaimState::Unclaimed,
        })
    }

    /// drive a claim through prove, verify and ledger settlement
    ///
    /// stale-root failures leave the claim unclaimed for reassembly
    /// with fresh roots; terminal failures reject it. returns the
    /// settled point total
    pub fn settle<B: ProofBackend, L: LedgerAuthority>(
        &self,
        claim: &mut RewardClaim,
        registry: &EdgeRegistry,
        local_unspent_root: Root,
        local_spent_root: Root,
        backend: &B,
        ledger: &mut L,
    ) -> Result<u128> {
        // Settled and Rejected are terminal: neither may re-enter the
        // pipeline, and a rejected claim must be reassembled from
        // scratch before any proving cost is paid again
        if matches!(claim.state, ClaimState::Settled | ClaimState::Rejected) {
            return Err(AnchorError::ReplaySettlement);
        }

        // roots can be evicted between assembly and submission; stale
        // use is expected and retryable, not a programming error
        let unspent_fresh = registry.validate_root_set(
            TreeKind::Unspent,
            &local_unspent_root,
            &claim.inputs.unspent_roots,
        );
        let spent_fresh = registry.validate_root_set(
            TreeKind::Spent,
            &local_spent_root,
            &claim.inputs.spent_roots,
        );
        if !unspent_fresh || !spent_fresh {
            return Err(AnchorError::StaleRoot);
        }

        let bundle = backend.prove_reward_claim(&claim.inputs)?;
        if !backend.verify(&bundle.public_signals, &bundle.proof) {
            // should never happen for well-formed inputs
            claim.state = ClaimState::Rejected;
            return Err(AnchorError::ProofBackend(
                "reward proof failed verification after proving".into(),
            ));
        }
        claim.state = ClaimState::Proven;

        let public = RewardPublicInputs {
            anonymity_points: claim.inputs.anonymity_points,
            reward_nullifier: claim.inputs.reward_nullifier,
            ext_data_hash: claim.inputs.ext_data_hash,
            spent_roots: claim.inputs.spent_roots.clone(),
            unspent_roots: claim.inputs.unspent_roots.clone(),
            public_input_hash: claim.inputs.public_input_hash,
        };

        if let Err(revert) = ledger.submit_reward(&bundle, &public) {
            let err = map_revert(revert);
            if !err.is_retryable() {
                warn!(nullifier = %hex::encode(claim.inputs.reward_nullifier.0), %err, "reward claim rejected");
                claim.state = ClaimState::Rejected;
            }
            return Err(err);
        }

        claim.state = ClaimState::Settled;
        info!(
            points = claim.inputs.anonymity_points,
            nullifier = %hex::encode(claim.inputs.reward_nullifier.0),
            "reward claim settled"
        );
        Ok(claim.inputs.anonymity_points)
    }
}

fn member_of_any(path: &MerklePath, leaf: &[u8; 32], roots: &[Root]) -> bool {
    roots
        .iter()
        .filter(|root| !root.is_empty())
        .any(|root| path.verify(leaf, root))
}
