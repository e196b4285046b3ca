//! Discrete rank assignment.
//!
//! The senior-most bands of the rank table carry exact capacities and are
//! filled by absolute position in the global score ordering; the remaining
//! bands are score thresholds scanned senior to junior. Population members
//! missing from the computed tree land in the least-senior band.

use std::collections::BTreeMap;

use contracts::{IdentityId, RankTable};

use crate::rollup::RootedTree;

/// Assign a rank table index to every member of `population`.
///
/// `population` is the authoritative member list and may contain identities
/// the tree never saw (inactive, filtered upstream); those default to the
/// least-senior rank.
pub fn assign_ranks(
    tree: &RootedTree,
    population: &[IdentityId],
    table: &RankTable,
) -> BTreeMap<IdentityId, usize> {
    let mut ordered: Vec<(IdentityId, f64)> = tree
        .nodes
        .iter()
        .map(|(id, node)| (*id, node.score))
        .collect();
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut ranks: BTreeMap<IdentityId, usize> = BTreeMap::new();
    let mut position = 0usize;

    // Capacity bands claim the top of the ordering outright.
    let mut threshold_start = 0usize;
    for (index, band) in table.bands.iter().enumerate() {
        let Some(capacity) = band.capacity else {
            threshold_start = index;
            break;
        };
        threshold_start = index + 1;
        for _ in 0..capacity {
            if position >= ordered.len() {
                break;
            }
            ranks.insert(ordered[position].0, index);
            position += 1;
        }
    }

    // Everyone else takes the first threshold band their score clears.
    for &(id, score) in &ordered[position..] {
        let mut assigned = table.least_senior();
        for (index, band) in table.bands.iter().enumerate().skip(threshold_start) {
            match band.min_score {
                Some(threshold) if score > threshold => {
                    assigned = index;
                    break;
                }
                Some(_) => continue,
                None => {
                    assigned = index;
                    break;
                }
            }
        }
        ranks.insert(id, assigned);
    }

    for &id in population {
        ranks.entry(id).or_insert_with(|| table.least_senior());
    }
    ranks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
