//! Full-pass hardening: hostile inputs, determinism across repeated passes,
//! and a realistic community fixture exercised end to end, including the
//! aggregator-to-pass handoff and promotion detection.

use std::collections::BTreeMap;
use std::time::Instant;

use contracts::{IdentityId, IdentityRecord, PairActivity, RankConfig};
use ranker_core::clock::ManualClock;
use ranker_core::engine::{PassInput, RankingEngine};
use ranker_core::presence::CoPresenceBuffer;
use ranker_core::promotion::PromotionMonitor;

const PERF_SMOKE_MAX_MS: u128 = 4_000;

fn identity(id: IdentityId, chat: f64, game: f64, days: u32, months: u32) -> IdentityRecord {
    IdentityRecord {
        id,
        chat_seconds: chat,
        game_seconds: game,
        tenure_days: days,
        tenure_months: months,
        last_active_at: 0,
    }
}

fn pair(lo: IdentityId, hi: IdentityId, chat: f64, game: f64) -> PairActivity {
    PairActivity {
        lo,
        hi,
        chat_seconds: chat,
        game_seconds: game,
    }
}

/// A small community: a tight veteran core, a mid cluster, and newcomers.
fn community_fixture() -> PassInput {
    let identities = vec![
        identity(1, 900_000.0, 400_000.0, 700, 24),
        identity(2, 700_000.0, 900_000.0, 650, 22),
        identity(3, 500_000.0, 100_000.0, 400, 14),
        identity(4, 250_000.0, 300_000.0, 300, 10),
        identity(5, 120_000.0, 80_000.0, 120, 4),
        identity(6, 60_000.0, 150_000.0, 90, 3),
        identity(7, 30_000.0, 10_000.0, 20, 1),
        identity(8, 5_000.0, 2_000.0, 3, 1),
        identity(9, 0.0, 0.0, 1, 1),
    ];
    let pairs = vec![
        pair(1, 2, 200_000.0, 350_000.0),
        pair(1, 3, 80_000.0, 90_000.0),
        pair(2, 4, 50_000.0, 120_000.0),
        pair(3, 4, 30_000.0, 20_000.0),
        pair(4, 5, 10_000.0, 40_000.0),
        pair(5, 6, 15_000.0, 8_000.0),
        pair(6, 7, 2_000.0, 5_000.0),
        pair(7, 8, 500.0, 1_000.0),
    ];
    PassInput { identities, pairs }
}

#[test]
fn community_pass_produces_a_single_ranked_tree() {
    let engine = RankingEngine::default();
    let output = engine.run_pass(&community_fixture());
    let snapshot = &output.snapshot;

    assert_eq!(snapshot.entries.len(), 9);
    let king = snapshot.king.expect("community has a king");
    let roots = snapshot
        .entries
        .values()
        .filter(|e| e.boss.is_none())
        .count();
    assert_eq!(roots, 1);
    assert_eq!(snapshot.entries[&king].boss, None);

    // The king holds the whole community's mass.
    let total: f64 = output.weights.values().sum();
    assert!((snapshot.entries[&king].leadership_score - total).abs() < 1e-6);

    // Scores order consistently with rank seniority.
    let mut entries: Vec<_> = snapshot.entries.values().collect();
    entries.sort_by(|a, b| b.leadership_score.total_cmp(&a.leadership_score));
    for window in entries.windows(2) {
        assert!(window[0].rank <= window[1].rank);
    }

    // The fully inactive newcomer still gets ranked, below everyone else,
    // and hangs directly off the king.
    let worst = snapshot.entries.values().map(|e| e.rank).max().unwrap();
    assert_eq!(snapshot.entries[&9].rank, worst);
    assert_eq!(snapshot.entries[&9].boss, Some(king));
}

#[test]
fn repeated_passes_are_identical() {
    let engine = RankingEngine::default();
    let input = community_fixture();
    let first = engine.run_pass(&input);
    let second = engine.run_pass(&input);
    assert_eq!(first.snapshot, second.snapshot);
}

#[test]
fn hostile_input_never_panics() {
    let engine = RankingEngine::default();

    // Self-loops, unknown endpoints, zero and negative activity.
    let input = PassInput {
        identities: vec![
            identity(1, -500.0, 0.0, 0, 0),
            identity(2, 0.0, 0.0, 0, 0),
            identity(1, 100.0, 100.0, 1, 1),
        ],
        pairs: vec![
            pair(1, 1, 1_000.0, 1_000.0),
            pair(1, 999, 1_000.0, 1_000.0),
            pair(1, 2, 0.0, 0.0),
            pair(1, 2, -50.0, -50.0),
        ],
    };
    let output = engine.run_pass(&input);
    assert_eq!(output.snapshot.entries.len(), 2);
    for entry in output.snapshot.entries.values() {
        assert!(entry.leadership_score >= 0.0);
    }
}

#[test]
fn aggregator_feeds_a_pass_through_pair_activity() {
    let clock = ManualClock::new();
    let mut buffer = CoPresenceBuffer::new(clock.clone(), 6 * 3600 * 1000);

    // One hour of the trio idling together, then an hour of a duo.
    clock.advance(3600 * 1000);
    buffer.seen_together(&[vec![1, 2, 3]]);
    clock.advance(3600 * 1000);
    buffer.seen_together(&[vec![1, 2]]);

    let records = buffer.pop_time_together(100);
    let mut pairs: Vec<PairActivity> = records
        .iter()
        .map(|r| pair(r.lo, r.hi, r.diluted_seconds, 0.0))
        .collect();
    pairs.sort_by_key(|p| (p.lo, p.hi));

    let engine = RankingEngine::default();
    let input = PassInput {
        identities: vec![
            identity(1, 50_000.0, 0.0, 300, 12),
            identity(2, 40_000.0, 0.0, 300, 12),
            identity(3, 30_000.0, 0.0, 300, 12),
        ],
        pairs,
    };
    let output = engine.run_pass(&input);

    // The 1-2 pair accumulated the most diluted time, so the MST keeps the
    // community joined through it and identity 1 outranks the rest.
    let king = output.snapshot.king.expect("king");
    assert_eq!(king, 1);
    assert_eq!(output.snapshot.entries[&1].rank, 0);
}

#[test]
fn promotions_detected_across_two_passes() {
    let config = RankConfig::default();
    let engine = RankingEngine::new(config.clone());
    let mut monitor = PromotionMonitor::new(0);

    // First pass: identity 5 is a small satellite.
    let mut input = community_fixture();
    let first = engine.run_pass(&input);
    let old_ranks: BTreeMap<IdentityId, usize> = first
        .snapshot
        .entries
        .iter()
        .map(|(id, e)| (*id, e.rank))
        .collect();

    // Identity 5's own activity explodes before the next pass, lifting its
    // subtree past the mid cluster in the global ordering.
    input.identities[4].chat_seconds = 1_200_000.0;
    let second = engine.run_pass(&input);

    let mut events = Vec::new();
    for (id, entry) in &second.snapshot.entries {
        if let Some(event) = monitor.observe(
            *id,
            old_ranks.get(id).copied(),
            entry.rank,
            1_000,
            2_000,
            &config,
        ) {
            events.push(event);
        }
    }

    let improved: Vec<IdentityId> = events.iter().map(|e| e.id).collect();
    assert!(improved.contains(&5), "identity 5 should announce");
    for event in &events {
        assert!(event.new_rank < event.old_rank);
    }

    // The same snapshot observed again announces nothing new.
    let mut repeats = 0;
    for (id, entry) in &second.snapshot.entries {
        if monitor
            .observe(*id, Some(entry.rank), entry.rank, 2_000, 3_000, &config)
            .is_some()
        {
            repeats += 1;
        }
    }
    assert_eq!(repeats, 0);
}

#[test]
fn large_community_pass_completes_quickly() {
    // Chain plus periodic cross links, all mature identities.
    let n: IdentityId = 500;
    let identities: Vec<IdentityRecord> = (1..=n)
        .map(|id| identity(id, (id % 97) as f64 * 3_600.0, 0.0, 300, 12))
        .collect();
    let mut pairs: Vec<PairActivity> = (1..n)
        .map(|id| pair(id, id + 1, (id % 13) as f64 * 600.0 + 60.0, 0.0))
        .collect();
    for id in (1..n - 7).step_by(17) {
        pairs.push(pair(id, id + 7, 900.0, 450.0));
    }

    let engine = RankingEngine::default();
    let started = Instant::now();
    let output = engine.run_pass(&PassInput { identities, pairs });
    let elapsed = started.elapsed().as_millis();

    assert_eq!(output.snapshot.entries.len(), n as usize);
    assert!(
        elapsed < PERF_SMOKE_MAX_MS,
        "pass took {}ms, budget {}ms",
        elapsed,
        PERF_SMOKE_MAX_MS
    );
}
