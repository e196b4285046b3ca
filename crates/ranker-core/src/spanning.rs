//! Minimum spanning forest over the fused relationship graph.
//!
//! Edge strengths convert to distances (`1/strength`), so minimizing total
//! distance maximizes aggregate relationship strength. Kruskal's algorithm
//! with union-find; equal distances break ties on the identity-pair key so
//! the forest is identical across passes.

use std::collections::BTreeMap;

use contracts::IdentityId;

use crate::fusion::FusedEdge;

/// Union-find over dense vertex indices, path halving and union by rank.
#[derive(Debug)]
struct DisjointSets {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets holding `a` and `b`. Returns false if already joined.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// Build the minimum spanning forest and return each vertex's accepted
/// neighbors. Every id in `vertices` appears in the output; vertices with no
/// positive-strength edge map to an empty neighbor list and form singleton
/// components.
pub fn minimum_spanning_forest(
    vertices: impl IntoIterator<Item = IdentityId>,
    edges: &[FusedEdge],
) -> BTreeMap<IdentityId, Vec<IdentityId>> {
    let mut neighbors: BTreeMap<IdentityId, Vec<IdentityId>> = BTreeMap::new();
    for id in vertices {
        neighbors.entry(id).or_default();
    }

    let mut index_of: BTreeMap<IdentityId, usize> = BTreeMap::new();
    for (index, id) in neighbors.keys().enumerate() {
        index_of.insert(*id, index);
    }

    // Distance is defined only for positive strengths; fusion filters the
    // rest out before this stage.
    let mut sorted: Vec<(f64, IdentityId, IdentityId)> = edges
        .iter()
        .filter(|e| index_of.contains_key(&e.lo) && index_of.contains_key(&e.hi))
        .map(|e| {
            debug_assert!(e.strength > 0.0);
            (1.0 / e.strength, e.lo, e.hi)
        })
        .collect();
    sorted.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| (a.1, a.2).cmp(&(b.1, b.2)))
    });

    let mut sets = DisjointSets::new(neighbors.len());
    for (_, lo, hi) in sorted {
        if sets.union(index_of[&lo], index_of[&hi]) {
            neighbors.entry(lo).or_default().push(hi);
            neighbors.entry(hi).or_default().push(lo);
        }
    }
    neighbors
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(lo: IdentityId, hi: IdentityId, strength: f64) -> FusedEdge {
        FusedEdge { lo, hi, strength }
    }

    fn edge_count(neighbors: &BTreeMap<IdentityId, Vec<IdentityId>>) -> usize {
        neighbors.values().map(Vec::len).sum::<usize>() / 2
    }

    #[test]
    fn connected_component_has_k_minus_one_edges() {
        let edges = vec![
            edge(1, 2, 10.0),
            edge(2, 3, 5.0),
            edge(1, 3, 2.0),
            edge(3, 4, 1.0),
        ];
        let forest = minimum_spanning_forest(1..=4, &edges);
        assert_eq!(edge_count(&forest), 3);
        // The cycle-closing weakest edge 1-3 is rejected.
        assert!(!forest[&1].contains(&3));
        assert!(forest[&3].contains(&4));
    }

    #[test]
    fn strongest_edges_win() {
        // Triangle: the weakest relationship is the one left out.
        let edges = vec![edge(1, 2, 10.0), edge(2, 3, 5.0), edge(1, 3, 1.0)];
        let forest = minimum_spanning_forest(1..=3, &edges);
        assert!(forest[&1].contains(&2));
        assert!(forest[&2].contains(&3));
        assert!(!forest[&1].contains(&3));
    }

    #[test]
    fn isolated_vertices_become_singletons() {
        let edges = vec![edge(1, 2, 3.0)];
        let forest = minimum_spanning_forest(1..=4, &edges);
        assert_eq!(forest.len(), 4);
        assert!(forest[&3].is_empty());
        assert!(forest[&4].is_empty());
    }

    #[test]
    fn equal_distances_break_ties_on_pair_key() {
        // Square with all-equal strengths: 1-2, 1-3, 2-4 are accepted in
        // pair-key order and 3-4 closes a cycle.
        let edges = vec![
            edge(3, 4, 1.0),
            edge(2, 4, 1.0),
            edge(1, 3, 1.0),
            edge(1, 2, 1.0),
        ];
        let forest = minimum_spanning_forest(1..=4, &edges);
        assert_eq!(edge_count(&forest), 3);
        assert!(forest[&1].contains(&2));
        assert!(forest[&1].contains(&3));
        assert!(forest[&2].contains(&4));
        assert!(!forest[&3].contains(&4));
    }

    #[test]
    fn unknown_vertices_in_edges_are_ignored() {
        let edges = vec![edge(1, 9, 5.0), edge(1, 2, 1.0)];
        let forest = minimum_spanning_forest(1..=2, &edges);
        assert_eq!(forest.len(), 2);
        assert_eq!(edge_count(&forest), 1);
    }

    #[test]
    fn empty_graph_yields_empty_forest() {
        let forest = minimum_spanning_forest(std::iter::empty(), &[]);
        assert!(forest.is_empty());
    }

    #[test]
    fn two_components_stay_separate() {
        let edges = vec![edge(1, 2, 5.0), edge(3, 4, 5.0)];
        let forest = minimum_spanning_forest(1..=4, &edges);
        assert_eq!(edge_count(&forest), 2);
        assert!(forest[&1].contains(&2));
        assert!(forest[&3].contains(&4));
        assert!(!forest[&2].contains(&3));
    }
}
