//! end-to-end lifecycle: queue deposits, commit batches, record the
//! unspent/spent lifecycle of a note and settle its anonymity reward

use rand::rngs::StdRng;
use rand::SeedableRng;

use masp_anchor::{
    AnchorConfig, AnchorError, ClaimState, ExtData, InMemoryLedger, MaspAnchor, MockProofBackend,
    RewardRates, TreeTarget,
};
use masp_pool::{
    Amount, AssetId, Blinding, ChainId, MaspKey, MaspUtxo, NoteKey, RewardKey, RewardUtxo, TokenId,
};

const DAY: u64 = 86_400;

fn anchor() -> MaspAnchor<MockProofBackend, InMemoryLedger> {
    let mut config = AnchorConfig::new(ChainId(1));
    config.tree_depth = 8;
    config.rates = RewardRates::new([(AssetId(1), 10)]);
    MaspAnchor::new(config, MockProofBackend, InMemoryLedger::new())
}

fn note(rng: &mut StdRng, amount: u128) -> MaspUtxo {
    MaspUtxo::new(
        ChainId(1),
        NoteKey::Spending(MaspKey::random(rng)),
        AssetId(1),
        TokenId::FUNGIBLE,
        Amount::new(amount),
        Blinding::random(rng),
    )
}

fn ext_data() -> ExtData {
    ExtData {
        fee: Amount::ZERO,
        recipient: [0xaa; 32],
        relayer: [0xbb; 32],
    }
}

/// drive two notes through deposit, unspent record and spent record
/// commits; returns the anchor and the claimable note
fn committed_lifecycle(
    rng: &mut StdRng,
    deposited_at: u64,
    spent_at: u64,
) -> (MaspAnchor<MockProofBackend, InMemoryLedger>, MaspUtxo) {
    let mut anchor = anchor();
    let claimable = note(rng, 100);
    let filler = note(rng, 40);

    anchor.queue_deposit_from_utxo(&claimable, false);
    anchor.queue_deposit_from_utxo(&filler, false);
    anchor.commit_batch(TreeTarget::Deposit, 0, 1).unwrap();

    anchor.queue_unspent_record(claimable.commitment(), deposited_at);
    anchor.queue_unspent_record(filler.commitment(), deposited_at);
    anchor.commit_batch(TreeTarget::UnspentRecord, 0, 1).unwrap();

    anchor.queue_spent_record(claimable.nullifier().unwrap(), spent_at);
    anchor.queue_spent_record(filler.nullifier().unwrap(), spent_at);
    anchor.commit_batch(TreeTarget::SpentRecord, 0, 1).unwrap();

    (anchor, claimable)
}

#[test]
fn test_full_lifecycle_accrues_points() {
    let mut rng = StdRng::seed_from_u64(1);
    // amount 100, rate 10, held for ten days
    let (mut anchor, claimable) = committed_lifecycle(&mut rng, 1_000, 1_000 + 10 * DAY);

    let mut claim = anchor
        .assemble_reward_claim(&claimable, 0, 1_000, 0, 1_000 + 10 * DAY, 0, ext_data())
        .unwrap();
    assert_eq!(claim.state(), ClaimState::Unclaimed);
    assert_eq!(claim.anonymity_points(), 864_000_000);

    let mut reward_note = RewardUtxo::new(
        ChainId(1),
        Amount::new(864),
        RewardKey::random(&mut rng),
        Blinding::random(&mut rng),
    );
    let points = anchor.settle_reward_claim(&mut claim, &mut reward_note).unwrap();
    assert_eq!(points, 864_000_000);
    assert_eq!(claim.state(), ClaimState::Settled);

    // reward note anchored, nullifier burned
    assert!(!anchor.reward_root().is_empty());
    assert_eq!(reward_note.anchored_index(), Some(0));
    assert!(anchor.ledger().is_settled(&claim.reward_nullifier()));
}

#[test]
fn test_double_claim_is_rejected() {
    let mut rng = StdRng::seed_from_u64(2);
    let (mut anchor, claimable) = committed_lifecycle(&mut rng, 1_000, 1_000 + DAY);

    let assemble = |anchor: &MaspAnchor<MockProofBackend, InMemoryLedger>| {
        anchor
            .assemble_reward_claim(&claimable, 0, 1_000, 0, 1_000 + DAY, 0, ext_data())
            .unwrap()
    };
    let mut reward_note = RewardUtxo::new(
        ChainId(1),
        Amount::new(1),
        RewardKey::random(&mut rng),
        Blinding::random(&mut rng),
    );

    let mut claim = assemble(&anchor);
    anchor.settle_reward_claim(&mut claim, &mut reward_note).unwrap();

    // resubmitting the settled claim object short-circuits locally
    let err = anchor
        .settle_reward_claim(&mut claim, &mut reward_note)
        .unwrap_err();
    assert_eq!(err, AnchorError::ReplaySettlement);

    // a freshly assembled claim for the same note reproduces the same
    // nullifier, and the ledger refuses it
    let mut replay = assemble(&anchor);
    assert_eq!(replay.reward_nullifier(), claim.reward_nullifier());
    let err = anchor
        .settle_reward_claim(&mut replay, &mut reward_note)
        .unwrap_err();
    assert_eq!(err, AnchorError::ReplaySettlement);
    assert_eq!(replay.state(), ClaimState::Rejected);

    // rejection is terminal: the same claim object refuses to re-enter
    // the pipeline
    let err = anchor
        .settle_reward_claim(&mut replay, &mut reward_note)
        .unwrap_err();
    assert_eq!(err, AnchorError::ReplaySettlement);
    assert_eq!(replay.state(), ClaimState::Rejected);
}

#[test]
fn test_stale_roots_require_reassembly() {
    let mut rng = StdRng::seed_from_u64(3);
    let (mut anchor, claimable) = committed_lifecycle(&mut rng, 1_000, 1_000 + DAY);

    let mut claim = anchor
        .assemble_reward_claim(&claimable, 0, 1_000, 0, 1_000 + DAY, 0, ext_data())
        .unwrap();

    // rotate the unspent root history until the claim's root ages out
    for round in 0..2u64 {
        let a = note(&mut rng, 5);
        let b = note(&mut rng, 5);
        anchor.queue_unspent_record(a.commitment(), 2_000 + round);
        anchor.queue_unspent_record(b.commitment(), 2_000 + round);
        anchor
            .commit_batch(TreeTarget::UnspentRecord, 2 + 2 * round, 1)
            .unwrap();
    }

    let mut reward_note = RewardUtxo::new(
        ChainId(1),
        Amount::new(1),
        RewardKey::random(&mut rng),
        Blinding::random(&mut rng),
    );
    let err = anchor
        .settle_reward_claim(&mut claim, &mut reward_note)
        .unwrap_err();
    assert_eq!(err, AnchorError::StaleRoot);
    assert!(err.is_retryable());
    // retryable: the claim was not consumed
    assert_eq!(claim.state(), ClaimState::Unclaimed);

    // reassembly against fresh roots settles
    let mut fresh = anchor
        .assemble_reward_claim(&claimable, 0, 1_000, 0, 1_000 + DAY, 0, ext_data())
        .unwrap();
    anchor.settle_reward_claim(&mut fresh, &mut reward_note).unwrap();
    assert_eq!(fresh.state(), ClaimState::Settled);
}

#[test]
fn test_cross_chain_roots_enter_claims() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut config = AnchorConfig::new(ChainId(1));
    config.tree_depth = 8;
    config.max_edges = 3;
    config.rates = RewardRates::new([(AssetId(1), 10)]);
    let mut anchor = MaspAnchor::new(config, MockProofBackend, InMemoryLedger::new());

    anchor.registry_mut().add_edge(ChainId(7)).unwrap();
    let remote_unspent = masp_merkle::Root([0x11; 32]);
    let remote_spent = masp_merkle::Root([0x22; 32]);
    anchor
        .registry_mut()
        .record_root(ChainId(7), masp_anchor::TreeKind::Unspent, remote_unspent)
        .unwrap();
    anchor
        .registry_mut()
        .record_root(ChainId(7), masp_anchor::TreeKind::Spent, remote_spent)
        .unwrap();

    let claimable = note(&mut rng, 100);
    let filler = note(&mut rng, 40);
    anchor.queue_deposit_from_utxo(&claimable, false);
    anchor.queue_deposit_from_utxo(&filler, false);
    anchor.commit_batch(TreeTarget::Deposit, 0, 1).unwrap();
    anchor.queue_unspent_record(claimable.commitment(), 1_000);
    anchor.queue_unspent_record(filler.commitment(), 1_000);
    anchor.commit_batch(TreeTarget::UnspentRecord, 0, 1).unwrap();
    anchor.queue_spent_record(claimable.nullifier().unwrap(), 1_000 + DAY);
    anchor.queue_spent_record(filler.nullifier().unwrap(), 1_000 + DAY);
    anchor.commit_batch(TreeTarget::SpentRecord, 0, 1).unwrap();

    let mut claim = anchor
        .assemble_reward_claim(&claimable, 0, 1_000, 0, 1_000 + DAY, 0, ext_data())
        .unwrap();
    // fixed-width set: local, remote edge, empty sentinel
    assert_eq!(claim.inputs.unspent_roots.len(), 3);
    assert_eq!(claim.inputs.unspent_roots[1], remote_unspent);
    assert!(claim.inputs.unspent_roots[2].is_empty());
    assert_eq!(claim.inputs.spent_roots[1], remote_spent);

    let mut reward_note = RewardUtxo::new(
        ChainId(1),
        Amount::new(1),
        RewardKey::random(&mut rng),
        Blinding::random(&mut rng),
    );
    anchor.settle_reward_claim(&mut claim, &mut reward_note).unwrap();
    assert_eq!(claim.state(), ClaimState::Settled);
}
