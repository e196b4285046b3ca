//! SQLite persistence for identity attributes, accumulated pair activity,
//! the computed hierarchy, and the promotion log.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use contracts::{
    CoPresenceRecord, HierarchySnapshot, IdentityId, IdentityRecord, PairActivity, PromotionEvent,
};
use rusqlite::{params, Connection};

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    NotAttached,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::NotAttached => write!(f, "sqlite store is not attached"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// One promotion log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionLogEntry {
    pub event: PromotionEvent,
    pub recorded_at: u64,
}

fn to_db_id(id: IdentityId) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

fn to_db_millis(millis: u64) -> i64 {
    i64::try_from(millis).unwrap_or(i64::MAX)
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    fn configure(&self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS identities (
                id INTEGER PRIMARY KEY,
                chat_seconds REAL NOT NULL DEFAULT 0,
                game_seconds REAL NOT NULL DEFAULT 0,
                tenure_days INTEGER NOT NULL DEFAULT 1,
                tenure_months INTEGER NOT NULL DEFAULT 1,
                last_active_at INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS pair_activity (
                lo_id INTEGER NOT NULL,
                hi_id INTEGER NOT NULL,
                chat_seconds REAL NOT NULL DEFAULT 0,
                game_seconds REAL NOT NULL DEFAULT 0,
                PRIMARY KEY (lo_id, hi_id)
             );
             CREATE TABLE IF NOT EXISTS hierarchy (
                id INTEGER PRIMARY KEY,
                rank INTEGER NOT NULL,
                leadership_score REAL NOT NULL,
                boss INTEGER,
                promoted INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS promotions (
                id INTEGER NOT NULL,
                old_rank INTEGER NOT NULL,
                new_rank INTEGER NOT NULL,
                title TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
             );",
        )?;
        Ok(())
    }

    // -- identities ---------------------------------------------------------

    pub fn upsert_identity(&self, record: &IdentityRecord) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT INTO identities
                (id, chat_seconds, game_seconds, tenure_days, tenure_months, last_active_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                chat_seconds = excluded.chat_seconds,
                game_seconds = excluded.game_seconds,
                tenure_days = excluded.tenure_days,
                tenure_months = excluded.tenure_months,
                last_active_at = excluded.last_active_at",
            params![
                to_db_id(record.id),
                record.chat_seconds,
                record.game_seconds,
                record.tenure_days,
                record.tenure_months,
                to_db_millis(record.last_active_at),
            ],
        )?;
        Ok(())
    }

    pub fn load_identities(&self) -> Result<Vec<IdentityRecord>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, chat_seconds, game_seconds, tenure_days, tenure_months, last_active_at
             FROM identities ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(IdentityRecord {
                id: row.get::<_, i64>(0)? as IdentityId,
                chat_seconds: row.get(1)?,
                game_seconds: row.get(2)?,
                tenure_days: row.get(3)?,
                tenure_months: row.get(4)?,
                last_active_at: row.get::<_, i64>(5)? as u64,
            })
        })?;
        let mut identities = Vec::new();
        for row in rows {
            identities.push(row?);
        }
        Ok(identities)
    }

    /// Refresh `last_active_at` for identities the store already knows.
    pub fn touch_identities(
        &self,
        ids: &BTreeSet<IdentityId>,
        now_millis: u64,
    ) -> Result<(), PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("UPDATE identities SET last_active_at = ?1 WHERE id = ?2")?;
        for &id in ids {
            stmt.execute(params![to_db_millis(now_millis), to_db_id(id)])?;
        }
        Ok(())
    }

    // -- pair activity ------------------------------------------------------

    /// Fold flushed co-presence records into the chat side of pair activity.
    pub fn accumulate_chat_presence(
        &self,
        records: &[CoPresenceRecord],
    ) -> Result<(), PersistenceError> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO pair_activity (lo_id, hi_id, chat_seconds, game_seconds)
             VALUES (?1, ?2, ?3, 0)
             ON CONFLICT(lo_id, hi_id) DO UPDATE SET
                chat_seconds = chat_seconds + excluded.chat_seconds",
        )?;
        for record in records {
            stmt.execute(params![
                to_db_id(record.lo),
                to_db_id(record.hi),
                record.diluted_seconds,
            ])?;
        }
        Ok(())
    }

    /// Fold game co-play time into pair activity; the game-side crawler
    /// calls this.
    pub fn accumulate_game_time(
        &self,
        lo: IdentityId,
        hi: IdentityId,
        seconds: f64,
    ) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT INTO pair_activity (lo_id, hi_id, chat_seconds, game_seconds)
             VALUES (?1, ?2, 0, ?3)
             ON CONFLICT(lo_id, hi_id) DO UPDATE SET
                game_seconds = game_seconds + excluded.game_seconds",
            params![to_db_id(lo), to_db_id(hi), seconds],
        )?;
        Ok(())
    }

    pub fn load_pairs(&self) -> Result<Vec<PairActivity>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT lo_id, hi_id, chat_seconds, game_seconds
             FROM pair_activity ORDER BY lo_id, hi_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PairActivity {
                lo: row.get::<_, i64>(0)? as IdentityId,
                hi: row.get::<_, i64>(1)? as IdentityId,
                chat_seconds: row.get(2)?,
                game_seconds: row.get(3)?,
            })
        })?;
        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(pairs)
    }

    // -- hierarchy ----------------------------------------------------------

    /// Ranks persisted by the previous pass, keyed by identity.
    pub fn load_ranks(&self) -> Result<BTreeMap<IdentityId, usize>, PersistenceError> {
        let mut stmt = self.conn.prepare("SELECT id, rank FROM hierarchy")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)? as IdentityId,
                row.get::<_, i64>(1)? as usize,
            ))
        })?;
        let mut ranks = BTreeMap::new();
        for row in rows {
            let (id, rank) = row?;
            ranks.insert(id, rank);
        }
        Ok(ranks)
    }

    /// Replace the hierarchy table with the given snapshot.
    pub fn replace_hierarchy(
        &mut self,
        snapshot: &HierarchySnapshot,
        promoted: &BTreeSet<IdentityId>,
    ) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM hierarchy", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO hierarchy (id, rank, leadership_score, boss, promoted)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for entry in snapshot.entries.values() {
                stmt.execute(params![
                    to_db_id(entry.id),
                    entry.rank as i64,
                    entry.leadership_score,
                    entry.boss.map(to_db_id),
                    promoted.contains(&entry.id) as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // -- promotions ---------------------------------------------------------

    pub fn record_promotions(
        &self,
        events: &[PromotionEvent],
        recorded_at: u64,
    ) -> Result<(), PersistenceError> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO promotions (id, old_rank, new_rank, title, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for event in events {
            stmt.execute(params![
                to_db_id(event.id),
                event.old_rank as i64,
                event.new_rank as i64,
                event.title,
                to_db_millis(recorded_at),
            ])?;
        }
        Ok(())
    }

    /// Most recent promotions first.
    pub fn load_promotions(&self, limit: usize) -> Result<Vec<PromotionLogEntry>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, old_rank, new_rank, title, recorded_at
             FROM promotions ORDER BY recorded_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(PromotionLogEntry {
                event: PromotionEvent {
                    id: row.get::<_, i64>(0)? as IdentityId,
                    old_rank: row.get::<_, i64>(1)? as usize,
                    new_rank: row.get::<_, i64>(2)? as usize,
                    title: row.get(3)?,
                },
                recorded_at: row.get::<_, i64>(4)? as u64,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
