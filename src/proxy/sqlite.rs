//! SQLite-based storage for cache generations

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::cache::{CacheStorage, CachedEntry};
use super::request::{RequestKey, Response, ResponseType};
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 2;

type Result<T> = std::result::Result<T, CacheError>;

/// SQLite-backed cache generations
pub struct SqliteCacheStorage {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteCacheStorage {
    /// Open or create cache storage inside `cache_dir`
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            std::fs::remove_file(&db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS generations (
                name TEXT PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS entries (
                generation TEXT NOT NULL,
                key_digest TEXT NOT NULL,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                response_type TEXT NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                fetched_at INTEGER NOT NULL,
                PRIMARY KEY (generation, key_digest),
                FOREIGN KEY (generation) REFERENCES generations(name) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_entries_generation ON entries(generation);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: db_path,
        })
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CacheError::Database(format!("Lock poisoned: {}", e)))
    }
}

fn ensure_generation(conn: &Connection, generation: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
        params![generation, Utc::now().timestamp()],
    )?;
    Ok(())
}

fn insert_entry(
    conn: &Connection,
    generation: &str,
    key: &RequestKey,
    response: &Response,
) -> Result<()> {
    let headers = serde_json::to_string(&response.headers)
        .map_err(|e| CacheError::Corrupt(format!("Failed to encode headers: {}", e)))?;

    ensure_generation(conn, generation)?;
    conn.execute(
        "INSERT OR REPLACE INTO entries
         (generation, key_digest, method, url, status, response_type, headers, body, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            generation,
            key.digest(),
            key.method,
            key.url,
            response.status,
            response.response_type.as_str(),
            headers,
            response.body,
            response.fetched_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

fn parse_response_type(s: &str) -> Result<ResponseType> {
    match s {
        "basic" => Ok(ResponseType::Basic),
        "cors" => Ok(ResponseType::Cors),
        "opaque" => Ok(ResponseType::Opaque),
        "error" => Ok(ResponseType::Error),
        other => Err(CacheError::Corrupt(format!("Unknown response type '{}'", other))),
    }
}

fn parse_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| CacheError::Corrupt(format!("Invalid timestamp {}", millis)))
}

impl CacheStorage for SqliteCacheStorage {
    fn match_entry(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>> {
        let conn = self.conn()?;

        let row: Option<(String, u16, String, String, Vec<u8>, i64)> = conn
            .query_row(
                "SELECT url, status, response_type, headers, body, fetched_at FROM entries
                 WHERE generation = ?1 AND key_digest = ?2",
                params![generation, key.digest()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((url, status, response_type, headers, body, fetched_at)) => {
                let headers: Vec<(String, String)> = serde_json::from_str(&headers)
                    .map_err(|e| CacheError::Corrupt(format!("Bad headers for {}: {}", url, e)))?;
                Ok(Some(Response {
                    url,
                    status,
                    headers,
                    body,
                    response_type: parse_response_type(&response_type)?,
                    fetched_at: parse_millis(fetched_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<()> {
        let conn = self.conn()?;
        insert_entry(&conn, generation, key, response)
    }

    fn put_all(&self, generation: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_generation(&tx, generation)?;
        for (key, response) in entries {
            insert_entry(&tx, generation, key, response)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn generations(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn delete_generation(&self, generation: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM entries WHERE generation = ?1", params![generation])?;
        let deleted = tx.execute("DELETE FROM generations WHERE name = ?1", params![generation])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn entries(&self, generation: &str) -> Result<Vec<CachedEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT method, url, status, response_type, LENGTH(body), fetched_at FROM entries
             WHERE generation = ?1 ORDER BY method, url",
        )?;

        let rows = stmt
            .query_map(params![generation], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u16>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(method, url, status, response_type, size, fetched_at)| {
                Ok(CachedEntry {
                    key: RequestKey { method, url },
                    status,
                    response_type: parse_response_type(&response_type)?,
                    size_bytes: size as usize,
                    fetched_at: parse_millis(fetched_at)?,
                })
            })
            .collect()
    }

    fn active_generation(&self) -> Result<Option<String>> {
        let conn = self.conn()?;
        let name = conn
            .query_row(
                "SELECT name FROM generations WHERE active = 1 LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(name)
    }

    fn set_active(&self, generation: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_generation(&tx, generation)?;
        tx.execute(
            "UPDATE generations SET active = (name = ?1)",
            params![generation],
        )?;
        tx.commit()?;
        Ok(())
    }
}
