//! Multi-source weight fusion.
//!
//! Raw per-identity and per-pair activity from the chat platform and the
//! game are blended into single scalar vertex weights and edge strengths.
//! A newcomer demotion factor keeps brand-new identities from acquiring
//! outsized influence from one burst of activity or a single lucky
//! relationship.

use std::collections::BTreeMap;

use contracts::{IdentityId, IdentityRecord, PairActivity, RankConfig};

/// One fused relationship edge. Invariant: `lo < hi`, `strength > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedEdge {
    pub lo: IdentityId,
    pub hi: IdentityId,
    pub strength: f64,
}

/// Fused vertex weights plus the surviving positive-strength edges.
#[derive(Debug, Clone, Default)]
pub struct FusedGraph {
    pub weights: BTreeMap<IdentityId, f64>,
    pub edges: Vec<FusedEdge>,
}

/// Newcomer demotion factor in `[floor^2, 1]`.
///
/// Two independent linear ramps, one over tenure days and one over tenure
/// months, each rising from the floor to 1.0 across its configured length.
/// Missing counters are treated as 1 to avoid the zero-floor singularity.
pub fn demotion_factor(tenure_days: u32, tenure_months: u32, config: &RankConfig) -> f64 {
    let ramp = |value: u32, length: f64| -> f64 {
        let value = value.max(1) as f64;
        config.demotion_floor + (1.0 - config.demotion_floor) * (value / length).min(1.0)
    };
    ramp(tenure_days, config.day_ramp_days) * ramp(tenure_months, config.month_ramp_months)
}

/// Fused activity score for one identity. Never negative, even for
/// malformed raw counters.
pub fn fuse_vertex(record: &IdentityRecord, config: &RankConfig) -> f64 {
    let blended = config.vertex_chat_weight * record.chat_seconds
        + config.vertex_game_weight * record.game_seconds;
    let fused = demotion_factor(record.tenure_days, record.tenure_months, config) * blended
        / config.seconds_per_hour;
    fused.max(0.0)
}

/// Fuse all vertices and edges for one pass.
///
/// Edges referencing an identity that is not in the vertex set are dropped
/// silently, as are edges whose fused strength is not strictly positive.
pub fn fuse(
    identities: &[IdentityRecord],
    pairs: &[PairActivity],
    config: &RankConfig,
) -> FusedGraph {
    let mut weights = BTreeMap::new();
    let mut demotions = BTreeMap::new();
    for record in identities {
        weights.insert(record.id, fuse_vertex(record, config));
        demotions.insert(
            record.id,
            demotion_factor(record.tenure_days, record.tenure_months, config),
        );
    }

    let mut edges = Vec::new();
    for pair in pairs {
        let (Some(lo_demotion), Some(hi_demotion)) =
            (demotions.get(&pair.lo), demotions.get(&pair.hi))
        else {
            continue;
        };
        let blended =
            config.edge_chat_weight * pair.chat_seconds + config.edge_game_weight * pair.game_seconds;
        let strength = lo_demotion * hi_demotion * blended / config.seconds_per_hour;
        if strength > 0.0 {
            edges.push(FusedEdge {
                lo: pair.lo,
                hi: pair.hi,
                strength,
            });
        }
    }

    FusedGraph { weights, edges }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
