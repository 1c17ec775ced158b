//! batched-insertion coordinator
//!
//! owns the four append-only trees (deposit, unspent record, spent
//! record, reward), the proxy queue, the edge registry and the reward
//! engine, and drives every mutation through the prove / verify /
//! submit / apply pipeline. nothing moves until the ledger accepts:
//! a failed or cancelled round-trip leaves trees, queue pointers and
//! claim state exactly as they were.

use std::collections::VecDeque;

use tracing::{debug, info};

use masp_merkle::{AppendTree, BatchWitness, Hash, MerklePath, Root, TreeError};
use masp_pool::{ChainId, Commitment, MaspUtxo, Nullifier, RewardUtxo};

use crate::backend::{BatchInsertInputs, ProofBackend};
use crate::error::{AnchorError, Result};
use crate::ledger::{map_revert, LedgerAuthority};
use crate::queue::{ProxyQueue, QueuedDeposit, TreeTarget};
use crate::registry::{EdgeRegistry, TreeKind};
use crate::reward::{ExtData, RewardClaim, RewardEngine, RewardRates};
use crate::BATCH_ARGS_DOMAIN;

/// anchor construction parameters
#[derive(Clone, Debug)]
pub struct AnchorConfig {
    pub local_chain: ChainId,
    pub tree_depth: usize,
    /// root-set width, local slot included
    pub max_edges: usize,
    /// roots retained per edge and per local record tree
    pub root_history_len: usize,
    pub rates: RewardRates,
}

impl AnchorConfig {
    pub fn new(local_chain: ChainId) -> Self {
        Self {
            local_chain,
            tree_depth: AppendTree::DEFAULT_DEPTH,
            max_edges: 2,
            root_history_len: EdgeRegistry::DEFAULT_HISTORY,
            rates: RewardRates::default(),
        }
    }
}

/// outcome of a committed batch insertion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedBatch {
    pub target: TreeTarget,
    pub first_leaf_index: u64,
    pub batch_size: u64,
    pub old_root: Root,
    pub new_root: Root,
}

/// point-in-time snapshot of the anchor's committed state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncedState {
    pub deposit_root: Root,
    pub unspent_root: Root,
    pub spent_root: Root,
    pub reward_root: Root,
    /// consumed pointers for deposit / unspent / spent queues
    pub consumed: [u64; 3],
    /// total queued entries for deposit / unspent / spent queues
    pub queued: [u64; 3],
}

/// bounded FIFO of recent local roots
#[derive(Clone, Debug)]
struct RootHistory {
    window: VecDeque<Root>,
    cap: usize,
}

impl RootHistory {
    fn new(cap: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(cap),
            cap,
        }
    }

    fn push(&mut self, root: Root) {
        if self.window.len() == self.cap {
            self.window.pop_front();
        }
        self.window.push_back(root);
    }

    fn contains(&self, root: &Root) -> bool {
        self.window.contains(root)
    }
}

/// the off-chain orchestration core
pub struct MaspAnchor<B: ProofBackend, L: LedgerAuthority> {
    config: AnchorConfig,
    deposit_tree: AppendTree,
    unspent_tree: AppendTree,
    spent_tree: AppendTree,
    reward_tree: AppendTree,
    queue: ProxyQueue,
    registry: EdgeRegistry,
    engine: RewardEngine,
    unspent_history: RootHistory,
    spent_history: RootHistory,
    backend: B,
    ledger: L,
}

impl<B: ProofBackend, L: LedgerAuthority> MaspAnchor<B, L> {
    /// fresh anchor with empty trees and queues
    pub fn new(config: AnchorConfig, backend: B, ledger: L) -> Self {
        let registry = EdgeRegistry::new(
            config.local_chain,
            config.max_edges,
            config.root_history_len,
        );
        let engine = RewardEngine::new(config.rates.clone());
        let depth = config.tree_depth;
        let history = config.root_history_len;
        Self {
            config,
            deposit_tree: AppendTree::new(depth),
            unspent_tree: AppendTree::new(depth),
            spent_tree: AppendTree::new(depth),
            reward_tree: AppendTree::new(depth),
            queue: ProxyQueue::new(),
            registry,
            engine,
            unspent_history: RootHistory::new(history),
            spent_history: RootHistory::new(history),
            backend,
            ledger,
        }
    }

    /// rebuild an anchor from previously committed leaf sequences
    ///
    /// the root is a pure function of the ordered leaves, so replaying
    /// them reproduces the committed state exactly
    pub fn attach_existing(
        config: AnchorConfig,
        backend: B,
        ledger: L,
        deposit_leaves: Vec<Hash>,
        unspent_leaves: Vec<Hash>,
        spent_leaves: Vec<Hash>,
        reward_leaves: Vec<Hash>,
    ) -> Result<Self> {
        let mut anchor = Self::new(config, backend, ledger);
        for leaf in deposit_leaves {
            anchor.deposit_tree.insert(leaf)?;
        }
        for leaf in unspent_leaves {
            anchor.unspent_tree.insert(leaf)?;
        }
        for leaf in spent_leaves {
            anchor.spent_tree.insert(leaf)?;
        }
        for leaf in reward_leaves {
            anchor.reward_tree.insert(leaf)?;
        }
        anchor.unspent_history.push(anchor.unspent_tree.root());
        anchor.spent_history.push(anchor.spent_tree.root());
        info!(
            deposits = anchor.deposit_tree.len(),
            unspent = anchor.unspent_tree.len(),
            spent = anchor.spent_tree.len(),
            rewards = anchor.reward_tree.len(),
            "attached to existing tree state"
        );
        Ok(anchor)
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    pub fn registry(&self) -> &EdgeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EdgeRegistry {
        &mut self.registry
    }

    pub fn queue(&self) -> &ProxyQueue {
        &self.queue
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    fn tree(&self, target: TreeTarget) -> &AppendTree {
        match target {
            TreeTarget::Deposit => &self.deposit_tree,
            TreeTarget::UnspentRecord => &self.unspent_tree,
            TreeTarget::SpentRecord => &self.spent_tree,
        }
    }

    /// committed root of a batch-driven tree
    pub fn root(&self, target: TreeTarget) -> Root {
        self.tree(target).root()
    }

    pub fn reward_root(&self) -> Root {
        self.reward_tree.root()
    }

    pub fn synced_state(&self) -> SyncedState {
        SyncedState {
            deposit_root: self.deposit_tree.root(),
            unspent_root: self.unspent_tree.root(),
            spent_root: self.spent_tree.root(),
            reward_root: self.reward_tree.root(),
            consumed: [
                self.queue.consumed(TreeTarget::Deposit),
                self.queue.consumed(TreeTarget::UnspentRecord),
                self.queue.consumed(TreeTarget::SpentRecord),
            ],
            queued: [
                self.queue.len(TreeTarget::Deposit),
                self.queue.len(TreeTarget::UnspentRecord),
                self.queue.len(TreeTarget::SpentRecord),
            ],
        }
    }

    /// queue a deposit; returns its queue index
    pub fn queue_deposit(&mut self, info: QueuedDeposit) -> u64 {
        self.queue.queue_deposit(info)
    }

    /// queue a deposit derived from a note
    pub fn queue_deposit_from_utxo(&mut self, utxo: &MaspUtxo, shielded: bool) -> u64 {
        self.queue.queue_deposit_from_utxo(utxo, shielded)
    }

    /// queue an unspent record for a commitment observed now
    pub fn queue_unspent_record(&mut self, commitment: Commitment, timestamp: u64) -> u64 {
        self.queue.queue_unspent_record(commitment, timestamp)
    }

    /// queue a spent record for a nullifier observed now
    pub fn queue_spent_record(&mut self, nullifier: Nullifier, timestamp: u64) -> u64 {
        self.queue.queue_spent_record(nullifier, timestamp)
    }

    /// prove and commit the next batch of `2^batch_size_log2` queued
    /// entries into the target tree
    ///
    /// strict ordering: `start_index` must equal the queue's consumed
    /// pointer. the tree and the pointer mutate only after the ledger
    /// accepts - any earlier failure leaves everything untouched, so
    /// the call is safe to retry
    pub fn commit_batch(
        &mut self,
        target: TreeTarget,
        start_index: u64,
        batch_size_log2: u32,
    ) -> Result<CommittedBatch> {
        // 2^64 leaves can never fit; an unbounded shift would wrap
        let batch_size = 1u64
            .checked_shl(batch_size_log2)
            .ok_or(AnchorError::Tree(TreeError::CapacityExceeded {
                depth: self.tree(target).depth(),
            }))?;
        let leaves = self.queue.stage_batch(target, start_index, batch_size)?;

        let tree = match target {
            TreeTarget::Deposit => &self.deposit_tree,
            TreeTarget::UnspentRecord => &self.unspent_tree,
            TreeTarget::SpentRecord => &self.spent_tree,
        };
        let witness = tree.stage_batch(batch_size as usize, &leaves)?;

        let args_hash = batch_args_hash(&witness);
        let inputs = BatchInsertInputs {
            args_hash,
            witness: witness.clone(),
            batch_height: batch_size_log2,
        };
        let bundle = self.backend.prove_batch_insert(&inputs)?;
        if !self.backend.verify(&bundle.public_signals, &bundle.proof) {
            // a proof we just produced must verify; anything else is a
            // backend consistency fault, not a recoverable condition
            return Err(AnchorError::ProofBackend(
                "batch proof failed verification after proving".into(),
            ));
        }

        self.ledger
            .submit_batch(target, &bundle, &witness)
            .map_err(map_revert)?;

        // ledger accepted: now, and only now, mutate local state
        let tree = match target {
            TreeTarget::Deposit => &mut self.deposit_tree,
            TreeTarget::UnspentRecord => &mut self.unspent_tree,
            TreeTarget::SpentRecord => &mut self.spent_tree,
        };
        let first_leaf_index = tree.apply_batch(&leaves)?;
        debug_assert_eq!(tree.root(), witness.new_root);
        self.queue.advance(target, batch_size);
        match target {
            TreeTarget::UnspentRecord => self.unspent_history.push(witness.new_root),
            TreeTarget::SpentRecord => self.spent_history.push(witness.new_root),
            TreeTarget::Deposit => {}
        }

        info!(
            ?target,
            first_leaf_index,
            batch_size,
            new_root = %hex::encode(witness.new_root.0),
            "committed batch"
        );
        Ok(CommittedBatch {
            target,
            first_leaf_index,
            batch_size,
            old_root: witness.old_root,
            new_root: witness.new_root,
        })
    }

    /// membership path for a committed leaf
    pub fn path_to(&self, target: TreeTarget, index: u64) -> Result<MerklePath> {
        Ok(self.tree(target).path_to(index)?)
    }

    /// assemble a reward claim for a note whose unspent and spent
    /// records are both committed
    ///
    /// `unspent_index` / `spent_index` are the record leaf positions in
    /// their trees; `note_path_index` is the note's position in the
    /// deposit tree. root sets come from the registry, fixed-width
    #[allow(clippy::too_many_arguments)]
    pub fn assemble_reward_claim(
        &self,
        note: &MaspUtxo,
        note_path_index: u64,
        unspent_timestamp: u64,
        unspent_index: u64,
        spent_timestamp: u64,
        spent_index: u64,
        ext_data: ExtData,
    ) -> Result<RewardClaim> {
        let unspent_path = self.unspent_tree.path_to(unspent_index)?;
        let spent_path = self.spent_tree.path_to(spent_index)?;
        let unspent_roots = self
            .registry
            .root_set(TreeKind::Unspent, self.unspent_tree.root());
        let spent_roots = self
            .registry
            .root_set(TreeKind::Spent, self.spent_tree.root());
        self.engine.assemble_claim(
            note,
            note_path_index,
            unspent_timestamp,
            unspent_path,
            unspent_roots,
            spent_timestamp,
            spent_path,
            spent_roots,
            ext_data,
        )
    }

    /// settle an assembled claim and anchor its reward note
    ///
    /// returns the settled anonymity points. the reward note joins the
    /// reward tree only after the ledger accepted the claim
    pub fn settle_reward_claim(
        &mut self,
        claim: &mut RewardClaim,
        reward_note: &mut RewardUtxo,
    ) -> Result<u128> {
        let local_unspent = claim
            .inputs
            .unspent_roots
            .first()
            .copied()
            .ok_or(AnchorError::StaleRoot)?;
        let local_spent = claim
            .inputs
            .spent_roots
            .first()
            .copied()
            .ok_or(AnchorError::StaleRoot)?;
        // roots age out of the history window; a claim assembled too
        // long ago must be rebuilt against fresh roots
        if !self.unspent_history.contains(&local_unspent)
            || !self.spent_history.contains(&local_spent)
        {
            return Err(AnchorError::StaleRoot);
        }

        let points = self.engine.settle(
            claim,
            &self.registry,
            local_unspent,
            local_spent,
            &self.backend,
            &mut self.ledger,
        )?;

        let index = self.reward_tree.insert(reward_note.commitment().0)?;
        reward_note.set_index(index)?;
        debug!(index, points, "anchored reward note");
        Ok(points)
    }
}

/// fold a batch witness into the single args-hash public input
fn batch_args_hash(witness: &BatchWitness) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(BATCH_ARGS_DOMAIN);
    hasher.update(&witness.old_root.0);
    hasher.update(&witness.new_root.0);
    hasher.update(&witness.first_leaf_index.to_be_bytes());
    for leaf in &witness.leaves {
        hasher.update(leaf);
    }
    *hasher.finalize().as_bytes()
}
