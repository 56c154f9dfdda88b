//! SQLite store of crawled members and their delivery state.
//!
//! The table is append-only: rows are inserted once per `member_id` and the
//! only later change is `delivered` flipping to true after a confirmed send.

use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::error::StoreError;

/// Members read per query while iterating pending candidates.
const PENDING_BATCH: usize = 64;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS members (
        seq               INTEGER PRIMARY KEY AUTOINCREMENT,
        member_id         INTEGER NOT NULL UNIQUE,
        source_collection TEXT    NOT NULL,
        display_name      TEXT    NOT NULL,
        delivered         INTEGER NOT NULL DEFAULT 0,
        in_primary_group  INTEGER NOT NULL DEFAULT 0,
        message_target    TEXT,
        created_at        TEXT    NOT NULL
    );
    CREATE INDEX IF NOT EXISTS members_pending
        ON members (delivered, in_primary_group, seq);
";

const MEMBER_COLUMNS: &str = "seq, member_id, source_collection, display_name, delivered, \
     in_primary_group, message_target, created_at";

/// A member observed for the first time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub member_id: i64,
    pub source_collection: String,
    pub display_name: String,
    pub in_primary_group: bool,
    pub message_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub member_id: i64,
    pub source_collection: String,
    pub display_name: String,
    pub delivered: bool,
    pub in_primary_group: bool,
    pub message_target: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Which undelivered members count as dispatch candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingScope {
    Everyone,
    ExcludePrimaryGroup,
}

impl PendingScope {
    fn condition(self) -> &'static str {
        match self {
            Self::Everyone => "delivered = 0",
            Self::ExcludePrimaryGroup => "delivered = 0 AND in_primary_group = 0",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: u64,
    pub delivered: u64,
    pub pending: u64,
    pub primary_group: u64,
}

pub struct MemberStore {
    conn: Connection,
}

impl MemberStore {
    /// Opens (or creates) the database file, creating its directory if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Inserts the member unless its id is already stored.
    ///
    /// Returns whether a row was inserted; an existing row is never touched.
    pub fn upsert_if_absent(&self, member: &NewMember) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO members
                (member_id, source_collection, display_name, in_primary_group,
                 message_target, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                member.member_id,
                member.source_collection,
                member.display_name,
                member.in_primary_group,
                member.message_target,
                Utc::now(),
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn get(&self, member_id: i64) -> Result<Option<MemberRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE member_id = ?1"
        ))?;
        let mut rows = stmt.query_map([member_id], |row| read_member(row).map(|(_, m)| m))?;
        Ok(rows.next().transpose()?)
    }

    pub fn count_pending(&self, scope: PendingScope) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM members WHERE {}", scope.condition()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Lazily iterates pending members in insertion order.
    ///
    /// Rows are read in small batches, so members may be marked delivered
    /// while iterating. Each call starts over from the first pending member.
    pub fn select_pending(&self, scope: PendingScope) -> PendingMembers<'_> {
        PendingMembers {
            store: self,
            scope,
            after_seq: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Flips `delivered` to true. Returns false for unknown or already
    /// delivered ids.
    pub fn mark_delivered(&self, member_id: i64) -> Result<bool, StoreError> {
        let updated = self.conn.execute(
            "UPDATE members SET delivered = 1 WHERE member_id = ?1 AND delivered = 0",
            [member_id],
        )?;
        Ok(updated > 0)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(delivered), 0),
                    COALESCE(SUM(delivered = 0 AND in_primary_group = 0), 0),
                    COALESCE(SUM(in_primary_group), 0)
             FROM members",
            [],
            |row| {
                Ok(StoreStats {
                    total: row.get::<_, i64>(0)? as u64,
                    delivered: row.get::<_, i64>(1)? as u64,
                    pending: row.get::<_, i64>(2)? as u64,
                    primary_group: row.get::<_, i64>(3)? as u64,
                })
            },
        )?;
        Ok(stats)
    }

    fn pending_batch(
        &self,
        scope: PendingScope,
        after_seq: i64,
    ) -> Result<Vec<(i64, MemberRecord)>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members
             WHERE {} AND seq > ?1
             ORDER BY seq
             LIMIT ?2",
            scope.condition()
        ))?;
        let rows = stmt.query_map(params![after_seq, PENDING_BATCH as i64], read_member)?;
        let mut batch = Vec::with_capacity(PENDING_BATCH);
        for row in rows {
            batch.push(row?);
        }
        Ok(batch)
    }
}

fn read_member(row: &Row<'_>) -> rusqlite::Result<(i64, MemberRecord)> {
    Ok((
        row.get(0)?,
        MemberRecord {
            member_id: row.get(1)?,
            source_collection: row.get(2)?,
            display_name: row.get(3)?,
            delivered: row.get(4)?,
            in_primary_group: row.get(5)?,
            message_target: row.get(6)?,
            created_at: row.get(7)?,
        },
    ))
}

/// Iterator returned by [`MemberStore::select_pending`].
pub struct PendingMembers<'a> {
    store: &'a MemberStore,
    scope: PendingScope,
    after_seq: i64,
    buffer: VecDeque<MemberRecord>,
    exhausted: bool,
}

impl Iterator for PendingMembers<'_> {
    type Item = Result<MemberRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self.store.pending_batch(self.scope, self.after_seq) {
                Ok(batch) => {
                    self.exhausted = batch.len() < PENDING_BATCH;
                    if let Some((seq, _)) = batch.last() {
                        self.after_seq = *seq;
                    }
                    self.buffer.extend(batch.into_iter().map(|(_, member)| member));
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
