//! In-process API facade: owns the co-presence buffer, the promotion cache,
//! and the pass runner, and wires them to SQLite persistence and the HTTP
//! server.

mod persistence;
mod server;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use contracts::{
    HierarchySnapshot, IdentityId, PassReport, PresenceUpdate, PromotionEvent, RankConfig,
    SCHEMA_VERSION_V1,
};
use ranker_core::clock::{Clock, SystemClock};
use ranker_core::engine::{PassInput, RankingEngine};
use ranker_core::presence::CoPresenceBuffer;
use ranker_core::promotion::PromotionMonitor;
use serde::{Deserialize, Serialize};

pub use persistence::{PersistenceError, PromotionLogEntry, SqliteStore};
pub use server::{serve, ServerError};

/// Cheap liveness summary for the CLI and the status route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineStatus {
    pub schema_version: String,
    pub buffered_pairs: usize,
    pub store_attached: bool,
    pub cached_promotions: usize,
    pub ranked_identities: usize,
}

/// The engine plus its cross-pass state. Everything here is synchronous;
/// the HTTP layer serializes access behind one mutex.
#[derive(Debug)]
pub struct EngineApi<C: Clock + Clone = SystemClock> {
    engine: RankingEngine,
    clock: C,
    buffer: CoPresenceBuffer<C>,
    monitor: PromotionMonitor,
    store: Option<SqliteStore>,
    last_snapshot: Option<HierarchySnapshot>,
}

impl EngineApi<SystemClock> {
    pub fn new(config: RankConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + Clone> EngineApi<C> {
    pub fn with_clock(config: RankConfig, clock: C) -> Self {
        let buffer = CoPresenceBuffer::new(clock.clone(), config.max_elapsed_millis);
        let monitor = PromotionMonitor::new(clock.now_millis());
        Self {
            engine: RankingEngine::new(config),
            clock,
            buffer,
            monitor,
            store: None,
            last_snapshot: None,
        }
    }

    pub fn attach_store(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        self.store = Some(SqliteStore::open(path)?);
        Ok(())
    }

    pub fn attach_memory_store(&mut self) -> Result<(), PersistenceError> {
        self.store = Some(SqliteStore::open_in_memory()?);
        Ok(())
    }

    pub fn config(&self) -> &RankConfig {
        self.engine.config()
    }

    /// One presence-poll tick. Feeds the aggregator and refreshes
    /// `last_active_at` for every observed identity the store knows.
    pub fn observe_presence(&mut self, update: &PresenceUpdate) -> Result<(), PersistenceError> {
        self.buffer.seen_together(&update.groups);
        if let Some(store) = self.store.as_ref() {
            let observed: BTreeSet<IdentityId> =
                update.groups.iter().flatten().copied().collect();
            if !observed.is_empty() {
                store.touch_identities(&observed, self.clock.now_millis())?;
            }
        }
        Ok(())
    }

    /// Drain one batch of buffered co-presence into the store. Returns the
    /// number of records folded in.
    pub fn flush_presence(&mut self) -> Result<usize, PersistenceError> {
        let store = self.store.as_ref().ok_or(PersistenceError::NotAttached)?;
        let batch = self
            .buffer
            .pop_time_together(self.engine.config().flush_batch_size);
        store.accumulate_chat_presence(&batch)?;
        Ok(batch.len())
    }

    /// Run one full ranking pass against the store: drain the aggregator,
    /// load the community snapshot, compute the hierarchy, detect
    /// promotions, and persist both.
    pub fn run_pass(&mut self) -> Result<PassReport, PersistenceError> {
        while !self.buffer.is_empty() {
            self.flush_presence()?;
        }

        let (identities, pairs, previous_ranks) = {
            let store = self.store.as_ref().ok_or(PersistenceError::NotAttached)?;
            (
                store.load_identities()?,
                store.load_pairs()?,
                store.load_ranks()?,
            )
        };

        let last_active: BTreeMap<IdentityId, u64> = identities
            .iter()
            .map(|record| (record.id, record.last_active_at))
            .collect();
        let output = self.engine.run_pass(&PassInput { identities, pairs });

        let now = self.clock.now_millis();
        let config = self.engine.config().clone();
        let mut promotions: Vec<PromotionEvent> = Vec::new();
        for (id, entry) in &output.snapshot.entries {
            let event = self.monitor.observe(
                *id,
                previous_ranks.get(id).copied(),
                entry.rank,
                last_active.get(id).copied().unwrap_or(0),
                now,
                &config,
            );
            if let Some(event) = event {
                promotions.push(event);
            }
        }

        {
            let store = self.store.as_mut().ok_or(PersistenceError::NotAttached)?;
            let promoted: BTreeSet<IdentityId> = promotions.iter().map(|e| e.id).collect();
            store.replace_hierarchy(&output.snapshot, &promoted)?;
            store.record_promotions(&promotions, now)?;
        }

        self.last_snapshot = Some(output.snapshot.clone());
        Ok(PassReport {
            snapshot: output.snapshot,
            promotions,
        })
    }

    /// The hierarchy computed by the most recent pass of this process.
    pub fn snapshot(&self) -> Option<&HierarchySnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn promotion_log(&self, limit: usize) -> Result<Vec<PromotionLogEntry>, PersistenceError> {
        let store = self.store.as_ref().ok_or(PersistenceError::NotAttached)?;
        store.load_promotions(limit)
    }

    pub fn store(&self) -> Option<&SqliteStore> {
        self.store.as_ref()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            buffered_pairs: self.buffer.len(),
            store_attached: self.store.is_some(),
            cached_promotions: self.monitor.cached(),
            ranked_identities: self
                .last_snapshot
                .as_ref()
                .map_or(0, |snapshot| snapshot.entries.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
