//! Promotion detection with hysteresis.
//!
//! Scores oscillate around band boundaries from pass to pass, so comparing
//! old and new ranks alone would announce the same promotion repeatedly as
//! an identity bounces across a boundary. A decaying high-water-mark cache
//! records the best rank recently seen per identity; an event fires only for
//! a strict improvement over both the previous rank and that mark. The whole
//! cache clears on a wall-clock interval so a genuine re-promotion after a
//! sustained demotion can announce again.

use std::collections::BTreeMap;

use contracts::{IdentityId, PromotionEvent, RankConfig};

/// High-water-mark cache of the best rank recently seen per identity.
#[derive(Debug)]
pub struct PromotionMonitor {
    best_rank_seen: BTreeMap<IdentityId, usize>,
    last_cleared_millis: u64,
}

impl PromotionMonitor {
    pub fn new(now_millis: u64) -> Self {
        Self {
            best_rank_seen: BTreeMap::new(),
            last_cleared_millis: now_millis,
        }
    }

    /// Report a freshly computed rank for an identity.
    ///
    /// `old_rank` is the rank persisted by the previous pass; `None` means
    /// the identity has never been ranked, which never announces. Fires only
    /// when the identity was active within the recency window and `new_rank`
    /// strictly improves on both `old_rank` and the cached best (absent
    /// cache entries default to the least-senior rank). Lower index is more
    /// senior.
    pub fn observe(
        &mut self,
        id: IdentityId,
        old_rank: Option<usize>,
        new_rank: usize,
        last_active_at: u64,
        now_millis: u64,
        config: &RankConfig,
    ) -> Option<PromotionEvent> {
        self.maybe_clear(now_millis, config);

        let old_rank = old_rank?;
        if new_rank >= old_rank {
            return None;
        }
        if now_millis.saturating_sub(last_active_at) > config.promotion_recency_millis {
            return None;
        }

        let best = self
            .best_rank_seen
            .get(&id)
            .copied()
            .unwrap_or_else(|| config.rank_table.least_senior());
        if new_rank >= best {
            return None;
        }

        self.best_rank_seen.insert(id, new_rank);
        Some(PromotionEvent {
            id,
            old_rank,
            new_rank,
            title: config.rank_table.title(new_rank).to_string(),
        })
    }

    /// Number of identities currently cached.
    pub fn cached(&self) -> usize {
        self.best_rank_seen.len()
    }

    fn maybe_clear(&mut self, now_millis: u64, config: &RankConfig) {
        if now_millis.saturating_sub(self.last_cleared_millis) >= config.promotion_clear_millis {
            self.best_rank_seen.clear();
            self.last_cleared_millis = now_millis;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
