//! Bottom-up score rollup.
//!
//! Converts the undirected spanning forest into one rooted tree with a
//! cumulative leadership score per vertex: each vertex's score is its own
//! fused weight plus the scores of everything beneath it. Vertices are
//! consumed from the leaves inward, so the heaviest people surface at the
//! top, and disconnected components are stitched under the global king.

use std::collections::{BTreeMap, BTreeSet};

use contracts::IdentityId;

/// One vertex of the rooted tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Own fused weight plus the scores of all descendants.
    pub score: f64,
    pub boss: Option<IdentityId>,
    /// Direct reports, sorted descending by score.
    pub subordinates: Vec<IdentityId>,
    /// Own id followed by every transitive subordinate, post-order.
    pub descendants: Vec<IdentityId>,
}

/// The rooted, scored tree covering every vertex of the forest.
#[derive(Debug, Clone, Default)]
pub struct RootedTree {
    pub king: Option<IdentityId>,
    pub nodes: BTreeMap<IdentityId, TreeNode>,
}

/// Roll the forest up into a single rooted tree.
///
/// Repeatedly selects, among vertices with at most one unscored neighbor,
/// the one whose own weight plus already-scored neighbor scores is minimal
/// (ties go to the smallest id). The sole remaining unscored neighbor at
/// selection time becomes the vertex's boss. Each component's last vertex
/// has no boss; those local roots are then stitched under the king, the
/// globally top-scoring vertex.
pub fn roll_up(
    weights: &BTreeMap<IdentityId, f64>,
    neighbors: &BTreeMap<IdentityId, Vec<IdentityId>>,
) -> RootedTree {
    let mut unscored: BTreeSet<IdentityId> = neighbors.keys().copied().collect();
    let mut scores: BTreeMap<IdentityId, f64> = BTreeMap::new();
    let mut scored_order: BTreeMap<IdentityId, usize> = BTreeMap::new();
    let mut boss: BTreeMap<IdentityId, Option<IdentityId>> = BTreeMap::new();
    let mut subordinates: BTreeMap<IdentityId, Vec<IdentityId>> = BTreeMap::new();

    while !unscored.is_empty() {
        let mut selected: Option<(f64, IdentityId)> = None;
        for &id in &unscored {
            let nbrs = &neighbors[&id];
            let unscored_nbrs = nbrs.iter().filter(|n| unscored.contains(n)).count();
            if unscored_nbrs > 1 {
                continue;
            }
            let score_sum = weights.get(&id).copied().unwrap_or(0.0)
                + nbrs.iter().filter_map(|n| scores.get(n)).sum::<f64>();
            // Strict less-than keeps the smallest id on ties because the
            // candidate scan runs in ascending id order.
            if selected.map_or(true, |(best, _)| score_sum < best) {
                selected = Some((score_sum, id));
            }
        }
        let Some((score, id)) = selected else {
            // A forest always exposes a near-leaf. Reaching this means the
            // neighbor lists contained a cycle.
            debug_assert!(false, "no near-leaf candidate in spanning forest");
            break;
        };

        unscored.remove(&id);
        let nbrs = &neighbors[&id];
        let mut scored_nbrs: Vec<IdentityId> = nbrs
            .iter()
            .copied()
            .filter(|n| scores.contains_key(n))
            .collect();
        scored_nbrs.sort_by_key(|n| scored_order[n]);

        boss.insert(id, nbrs.iter().copied().find(|n| unscored.contains(n)));
        subordinates.insert(id, scored_nbrs);
        scored_order.insert(id, scores.len());
        scores.insert(id, score);
    }

    // Stitch every other local root under the globally top-scoring vertex.
    let king = scores
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(id, _)| *id);
    if let Some(king_id) = king {
        let local_roots: Vec<IdentityId> = boss
            .iter()
            .filter(|(id, b)| b.is_none() && **id != king_id)
            .map(|(id, _)| *id)
            .collect();
        for root in local_roots {
            boss.insert(root, Some(king_id));
            let root_score = scores.get(&root).copied().unwrap_or(0.0);
            if let Some(subs) = subordinates.get_mut(&king_id) {
                subs.push(root);
            }
            if let Some(king_score) = scores.get_mut(&king_id) {
                *king_score += root_score;
            }
        }
    }

    for subs in subordinates.values_mut() {
        subs.sort_by(|a, b| scores[b].total_cmp(&scores[a]));
    }

    // Post-order descendant lists, iterative to keep deep chains off the
    // call stack.
    let mut descendants: BTreeMap<IdentityId, Vec<IdentityId>> = BTreeMap::new();
    if let Some(king_id) = king {
        let mut stack: Vec<(IdentityId, bool)> = vec![(king_id, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                let mut list = vec![id];
                for child in &subordinates[&id] {
                    if let Some(child_list) = descendants.get(child) {
                        list.extend_from_slice(child_list);
                    }
                }
                descendants.insert(id, list);
            } else {
                stack.push((id, true));
                for child in subordinates[&id].iter().rev() {
                    stack.push((*child, false));
                }
            }
        }
    }

    let mut nodes = BTreeMap::new();
    for (id, score) in &scores {
        nodes.insert(
            *id,
            TreeNode {
                score: *score,
                boss: boss.get(id).copied().flatten(),
                subordinates: subordinates.get(id).cloned().unwrap_or_default(),
                descendants: descendants.get(id).cloned().unwrap_or_default(),
            },
        );
    }
    RootedTree { king, nodes }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn adjacency(pairs: &[(IdentityId, IdentityId)], vertices: &[IdentityId]) -> BTreeMap<IdentityId, Vec<IdentityId>> {
        let mut neighbors: BTreeMap<IdentityId, Vec<IdentityId>> = BTreeMap::new();
        for &id in vertices {
            neighbors.entry(id).or_default();
        }
        for &(a, b) in pairs {
            neighbors.entry(a).or_default().push(b);
            neighbors.entry(b).or_default().push(a);
        }
        neighbors
    }

    fn assert_score_invariant(tree: &RootedTree, weights: &BTreeMap<IdentityId, f64>) {
        for (id, node) in &tree.nodes {
            let expected: f64 = node
                .descendants
                .iter()
                .map(|d| weights.get(d).copied().unwrap_or(0.0))
                .sum();
            assert!(
                approx(node.score, expected),
                "vertex {} score {} != descendant weight sum {}",
                id,
                node.score,
                expected
            );
        }
    }

    #[test]
    fn dominant_vertex_chain_rolls_up_to_the_top() {
        // 1-2 and 2-3, with vertex 1 carrying most of the weight. 3 scores
        // first under 2, 2 scores under 1, and 1 roots the tree with the
        // component total.
        let weights = BTreeMap::from([(1, 5.0), (2, 1.0), (3, 1.0)]);
        let neighbors = adjacency(&[(1, 2), (2, 3)], &[1, 2, 3]);
        let tree = roll_up(&weights, &neighbors);

        assert_eq!(tree.king, Some(1));
        assert!(approx(tree.nodes[&1].score, 7.0));
        assert!(approx(tree.nodes[&2].score, 2.0));
        assert!(approx(tree.nodes[&3].score, 1.0));
        assert_eq!(tree.nodes[&1].boss, None);
        assert_eq!(tree.nodes[&2].boss, Some(1));
        assert_eq!(tree.nodes[&3].boss, Some(2));
        assert_eq!(tree.nodes[&1].subordinates, vec![2]);
        assert_eq!(tree.nodes[&2].subordinates, vec![3]);
        assert_eq!(tree.nodes[&1].descendants, vec![1, 2, 3]);
        assert_score_invariant(&tree, &weights);
    }

    #[test]
    fn equal_weights_crown_the_hub() {
        // With equal weights the leaves are consumed first and the central
        // vertex absorbs the whole component.
        let weights = BTreeMap::from([(1, 1.0), (2, 1.0), (3, 1.0)]);
        let neighbors = adjacency(&[(1, 2), (2, 3)], &[1, 2, 3]);
        let tree = roll_up(&weights, &neighbors);

        assert_eq!(tree.king, Some(2));
        assert!(approx(tree.nodes[&2].score, 3.0));
        assert_eq!(tree.nodes[&1].boss, Some(2));
        assert_eq!(tree.nodes[&3].boss, Some(2));
        assert_score_invariant(&tree, &weights);
    }

    #[test]
    fn disconnected_components_stitch_under_the_king() {
        let weights = BTreeMap::from([(1, 2.0), (2, 1.0), (3, 0.5)]);
        let neighbors = adjacency(&[(1, 2)], &[1, 2, 3]);
        let tree = roll_up(&weights, &neighbors);

        assert_eq!(tree.king, Some(1));
        assert!(approx(tree.nodes[&1].score, 3.5));
        assert_eq!(tree.nodes[&3].boss, Some(1));
        assert_eq!(tree.nodes[&1].subordinates, vec![2, 3]);
        assert_eq!(tree.nodes[&1].descendants, vec![1, 2, 3]);
        assert_score_invariant(&tree, &weights);
    }

    #[test]
    fn exactly_one_root_after_stitching() {
        let weights: BTreeMap<IdentityId, f64> =
            (1..=7).map(|id| (id, id as f64 * 0.25)).collect();
        let neighbors = adjacency(&[(1, 2), (2, 3), (4, 5)], &(1..=7).collect::<Vec<_>>());
        let tree = roll_up(&weights, &neighbors);

        let roots: Vec<IdentityId> = tree
            .nodes
            .iter()
            .filter(|(_, n)| n.boss.is_none())
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(roots.len(), 1);
        assert_eq!(Some(roots[0]), tree.king);

        // Every non-root appears in exactly one subordinates list.
        for (id, node) in &tree.nodes {
            if node.boss.is_some() {
                let holders = tree
                    .nodes
                    .values()
                    .filter(|n| n.subordinates.contains(id))
                    .count();
                assert_eq!(holders, 1, "vertex {} held by {} bosses", id, holders);
            }
        }
        assert_score_invariant(&tree, &weights);
    }

    #[test]
    fn subordinates_sorted_descending_by_score() {
        // Star around vertex 5 with unequal leaf weights.
        let weights = BTreeMap::from([(1, 0.5), (2, 3.0), (3, 1.5), (5, 10.0)]);
        let neighbors = adjacency(&[(5, 1), (5, 2), (5, 3)], &[1, 2, 3, 5]);
        let tree = roll_up(&weights, &neighbors);

        assert_eq!(tree.king, Some(5));
        assert_eq!(tree.nodes[&5].subordinates, vec![2, 3, 1]);
        assert_score_invariant(&tree, &weights);
    }

    #[test]
    fn empty_graph_yields_trivial_tree() {
        let tree = roll_up(&BTreeMap::new(), &BTreeMap::new());
        assert_eq!(tree.king, None);
        assert!(tree.nodes.is_empty());
    }

    #[test]
    fn singleton_graph_crowns_itself() {
        let weights = BTreeMap::from([(9, 1.25)]);
        let neighbors = adjacency(&[], &[9]);
        let tree = roll_up(&weights, &neighbors);
        assert_eq!(tree.king, Some(9));
        assert_eq!(tree.nodes[&9].boss, None);
        assert!(approx(tree.nodes[&9].score, 1.25));
        assert_eq!(tree.nodes[&9].descendants, vec![9]);
    }

    #[test]
    fn king_tie_goes_to_smallest_id() {
        // Two singletons with identical weights.
        let weights = BTreeMap::from([(4, 1.0), (8, 1.0)]);
        let neighbors = adjacency(&[], &[4, 8]);
        let tree = roll_up(&weights, &neighbors);
        assert_eq!(tree.king, Some(4));
        assert_eq!(tree.nodes[&8].boss, Some(4));
        assert!(approx(tree.nodes[&4].score, 2.0));
    }
}
