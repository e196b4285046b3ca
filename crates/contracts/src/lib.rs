//! Cross-boundary contracts for the co-presence ranking engine, its HTTP API,
//! and persistence.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod serde_u64_string;

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Canonical key for one tracked person. External account identifiers
/// (chat-platform snowflake, game id) are unified into this key upstream.
pub type IdentityId = u64;

// ---------------------------------------------------------------------------
// Pass input records
// ---------------------------------------------------------------------------

/// Per-identity attributes read from the store at pass start.
///
/// Activity counters are lifetime accumulated seconds per source. Tenure
/// counters of zero are treated as one inside the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityRecord {
    #[serde(with = "serde_u64_string")]
    pub id: IdentityId,
    pub chat_seconds: f64,
    pub game_seconds: f64,
    pub tenure_days: u32,
    pub tenure_months: u32,
    /// Unix milliseconds of the most recent observation of this identity.
    pub last_active_at: u64,
}

/// Accumulated co-presence per unordered identity pair. Invariant: `lo < hi`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairActivity {
    #[serde(with = "serde_u64_string")]
    pub lo: IdentityId,
    #[serde(with = "serde_u64_string")]
    pub hi: IdentityId,
    pub chat_seconds: f64,
    pub game_seconds: f64,
}

/// One buffered co-presence accumulation, keyed by the unordered pair.
///
/// `duration_seconds` is raw elapsed time; `diluted_seconds` divides each
/// observation by the number of other people present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoPresenceRecord {
    #[serde(with = "serde_u64_string")]
    pub lo: IdentityId,
    #[serde(with = "serde_u64_string")]
    pub hi: IdentityId,
    pub duration_seconds: f64,
    pub diluted_seconds: f64,
}

/// One presence-poll tick: the members of every room observed at this moment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceUpdate {
    #[serde(with = "serde_u64_string::nested_seq")]
    pub groups: Vec<Vec<IdentityId>>,
}

// ---------------------------------------------------------------------------
// Rank table
// ---------------------------------------------------------------------------

/// Broad role family a rank band belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RankRole {
    Marshal,
    General,
    Officer,
    Grunt,
}

/// One band in the rank table.
///
/// Senior bands carry `capacity` (filled by absolute position in the global
/// score ordering); the rest carry `min_score` thresholds. The final band may
/// carry neither, making it the catch-all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankBand {
    pub title: String,
    pub insignia: String,
    pub role: RankRole,
    pub capacity: Option<usize>,
    pub min_score: Option<f64>,
}

impl RankBand {
    fn capped(title: &str, insignia: &str, role: RankRole, capacity: usize) -> Self {
        Self {
            title: title.to_string(),
            insignia: insignia.to_string(),
            role,
            capacity: Some(capacity),
            min_score: None,
        }
    }

    fn threshold(title: &str, insignia: &str, role: RankRole, min_score: f64) -> Self {
        Self {
            title: title.to_string(),
            insignia: insignia.to_string(),
            role,
            capacity: None,
            min_score: Some(min_score),
        }
    }

    fn catch_all(title: &str, insignia: &str, role: RankRole) -> Self {
        Self {
            title: title.to_string(),
            insignia: insignia.to_string(),
            role,
            capacity: None,
            min_score: None,
        }
    }
}

/// Ordered rank bands, most senior first. Rank index 0 is the most senior.
///
/// Invariant: capacity bands form a prefix, threshold values strictly
/// decrease, and only the final band is a catch-all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankTable {
    pub bands: Vec<RankBand>,
}

impl RankTable {
    /// Index of the least-senior band, the default for unranked identities.
    pub fn least_senior(&self) -> usize {
        self.bands.len().saturating_sub(1)
    }

    pub fn band(&self, index: usize) -> Option<&RankBand> {
        self.bands.get(index)
    }

    /// Title of a band, or the empty string for an out-of-range index.
    pub fn title(&self, index: usize) -> &str {
        self.bands.get(index).map_or("", |b| b.title.as_str())
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self {
            bands: vec![
                RankBand::capped("President", "⚑", RankRole::Marshal, 1),
                RankBand::capped("Vice President", "⚑", RankRole::Marshal, 1),
                RankBand::capped("General", "★★★★", RankRole::General, 2),
                RankBand::capped("General", "★★★", RankRole::General, 3),
                RankBand::capped("General", "★★", RankRole::General, 4),
                RankBand::capped("General", "★", RankRole::General, 5),
                RankBand::threshold("Colonel", "❱❱❱❱", RankRole::Officer, 50.0),
                RankBand::threshold("Major", "❱❱❱", RankRole::Officer, 30.0),
                RankBand::threshold("Captain", "❱❱", RankRole::Officer, 20.0),
                RankBand::threshold("Lieutenant", "❱", RankRole::Officer, 12.0),
                RankBand::threshold("Sergeant", "⦁⦁⦁", RankRole::Grunt, 6.0),
                RankBand::threshold("Corporal", "⦁⦁", RankRole::Grunt, 2.0),
                RankBand::catch_all("Recruit", "⦁", RankRole::Grunt),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

/// Every tunable of the ranking engine, with production defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankConfig {
    pub schema_version: String,
    /// Vertex fusion blend: chat dominates personal activity.
    pub vertex_chat_weight: f64,
    pub vertex_game_weight: f64,
    /// Edge fusion blend: shared game time dominates relationships.
    pub edge_chat_weight: f64,
    pub edge_game_weight: f64,
    /// Normalizer converting weighted seconds to score units.
    pub seconds_per_hour: f64,
    /// Demotion ramp floor applied to brand-new identities.
    pub demotion_floor: f64,
    /// Days until the day ramp saturates at 1.0.
    pub day_ramp_days: f64,
    /// Months until the month ramp saturates at 1.0.
    pub month_ramp_months: f64,
    /// Elapsed-time ceiling for one aggregator tick, in milliseconds.
    pub max_elapsed_millis: u64,
    /// Records popped from the co-presence buffer per flush batch.
    pub flush_batch_size: usize,
    /// An identity must have been active within this window for a promotion
    /// to announce, in milliseconds.
    pub promotion_recency_millis: u64,
    /// Interval between wholesale promotion-cache clears, in milliseconds.
    pub promotion_clear_millis: u64,
    pub rank_table: RankTable,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            vertex_chat_weight: 0.8,
            vertex_game_weight: 0.2,
            edge_chat_weight: 0.2,
            edge_game_weight: 1.0,
            seconds_per_hour: 3600.0,
            demotion_floor: 0.2,
            day_ramp_days: 30.0,
            month_ramp_months: 8.0,
            max_elapsed_millis: 6 * 3600 * 1000,
            flush_batch_size: 100,
            promotion_recency_millis: 72 * 3600 * 1000,
            promotion_clear_millis: 4 * 3600 * 1000,
            rank_table: RankTable::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pass output
// ---------------------------------------------------------------------------

/// One identity's position in the computed hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HierarchyEntry {
    #[serde(with = "serde_u64_string")]
    pub id: IdentityId,
    pub leadership_score: f64,
    #[serde(with = "serde_u64_string::option")]
    pub boss: Option<IdentityId>,
    #[serde(with = "serde_u64_string::seq")]
    pub subordinates: Vec<IdentityId>,
    /// Index into the rank table. Lower is more senior.
    pub rank: usize,
}

/// The rooted, ranked tree produced by one ranking pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HierarchySnapshot {
    pub schema_version: String,
    #[serde(with = "serde_u64_string::option")]
    pub king: Option<IdentityId>,
    pub entries: BTreeMap<IdentityId, HierarchyEntry>,
}

impl HierarchySnapshot {
    pub fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            king: None,
            entries: BTreeMap::new(),
        }
    }
}

/// A detected genuine rank improvement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromotionEvent {
    #[serde(with = "serde_u64_string")]
    pub id: IdentityId,
    /// Rank persisted by the previous pass.
    pub old_rank: usize,
    pub new_rank: usize,
    pub title: String,
}

/// Snapshot plus the promotions the pass produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassReport {
    pub snapshot: HierarchySnapshot,
    pub promotions: Vec<PromotionEvent>,
}

// ---------------------------------------------------------------------------
// API error envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    NotFound,
    StoreUnavailable,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::StoreUnavailable => "store_unavailable",
            Self::InternalError => "internal_error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
