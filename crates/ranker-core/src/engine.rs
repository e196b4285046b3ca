//! One ranking pass, end to end.
//!
//! Pure and synchronous: fuse raw activity into weights and strengths,
//! build the minimum spanning forest, roll it up into a rooted scored tree,
//! and discretize scores into ranks. All I/O (loading input, persisting the
//! result, announcing promotions) belongs to the caller.

use std::collections::BTreeMap;

use contracts::{
    HierarchyEntry, HierarchySnapshot, IdentityId, IdentityRecord, PairActivity, RankConfig,
    SCHEMA_VERSION_V1,
};

use crate::fusion;
use crate::rank;
use crate::rollup;
use crate::spanning;

/// Raw material for one pass.
#[derive(Debug, Clone, Default)]
pub struct PassInput {
    pub identities: Vec<IdentityRecord>,
    pub pairs: Vec<PairActivity>,
}

/// The computed hierarchy plus the fused weights that produced it.
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub snapshot: HierarchySnapshot,
    pub weights: BTreeMap<IdentityId, f64>,
}

/// Stateless pass runner configured once at startup.
#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    config: RankConfig,
}

impl RankingEngine {
    pub fn new(config: RankConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    /// Run one full ranking pass over a snapshot of the community.
    ///
    /// An empty input produces a trivial snapshot with no king. Duplicate
    /// identity records collapse to the last occurrence.
    pub fn run_pass(&self, input: &PassInput) -> PassOutput {
        let graph = fusion::fuse(&input.identities, &input.pairs, &self.config);
        let forest = spanning::minimum_spanning_forest(graph.weights.keys().copied(), &graph.edges);
        let tree = rollup::roll_up(&graph.weights, &forest);

        let population: Vec<IdentityId> = input.identities.iter().map(|r| r.id).collect();
        let ranks = rank::assign_ranks(&tree, &population, &self.config.rank_table);

        let least_senior = self.config.rank_table.least_senior();
        let mut entries = BTreeMap::new();
        for (id, rank_index) in &ranks {
            let entry = match tree.nodes.get(id) {
                Some(node) => HierarchyEntry {
                    id: *id,
                    leadership_score: node.score,
                    boss: node.boss,
                    subordinates: node.subordinates.clone(),
                    rank: *rank_index,
                },
                None => HierarchyEntry {
                    id: *id,
                    leadership_score: 0.0,
                    boss: None,
                    subordinates: Vec::new(),
                    rank: least_senior,
                },
            };
            entries.insert(*id, entry);
        }

        PassOutput {
            snapshot: HierarchySnapshot {
                schema_version: SCHEMA_VERSION_V1.to_string(),
                king: tree.king,
                entries,
            },
            weights: graph.weights,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
