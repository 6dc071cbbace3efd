use std::path::Path;

use chrono::Utc;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CovgateError, Result};

pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = include_str!("../schema.sql");

/// Identity of a baseline profile. Builds are immutable, so a key always
/// maps to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub job: String,
    pub build_id: String,
    pub profile_name: String,
}

/// Local store of baseline profiles already fetched from remote storage.
///
/// Entries are written once and never updated.
pub struct BaselineCache {
    conn: Connection,
}

impl BaselineCache {
    /// Open (or create) the cache database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let content = self
            .conn
            .query_row(
                "SELECT content FROM baseline_profile \
                 WHERE job = ?1 AND build_id = ?2 AND profile_name = ?3",
                params![key.job, key.build_id, key.profile_name],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        debug!(
            "cache {} for {}/{}/{}",
            if content.is_some() { "hit" } else { "miss" },
            key.job,
            key.build_id,
            key.profile_name
        );
        Ok(content)
    }

    /// Store a profile. An existing entry for the key is left untouched.
    pub fn put(&self, key: &CacheKey, content: &[u8]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO baseline_profile \
             (job, build_id, profile_name, content, fetched_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key.job, key.build_id, key.profile_name, content, now],
        )?;
        Ok(())
    }

    pub fn len(&self) -> Result<u64> {
        let count = self.conn.query_row("SELECT COUNT(*) FROM baseline_profile", [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Ensure the schema is initialized. Safe to call on an already-initialized DB.
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    match version {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }
        Some(v) if v == SCHEMA_VERSION => {}
        Some(v) => {
            return Err(CovgateError::Other(format!(
                "Cache schema version {v} is not supported (expected {SCHEMA_VERSION}). \
                 Delete the cache file and retry."
            )));
        }
    }
    Ok(())
}
