//! The persistent rate-limit discovery store: an r2d2-pooled
//! SQLite database holding the `rate_limits` table (upserted per
//! `ShouldUpdate`) and the append-only `learning_data` log.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use patience_core::{FactSource, RateLimitFact};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::confidence::{compute_confidence, should_update};
use crate::error::DiscoveryError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS rate_limits (
    resource_id       TEXT NOT NULL,
    host              TEXT NOT NULL,
    path              TEXT NOT NULL,
    limit_value       INTEGER NOT NULL,
    window_seconds    INTEGER NOT NULL,
    remaining         INTEGER NOT NULL,
    reset_time        TEXT NOT NULL,
    source            TEXT NOT NULL,
    confidence        REAL NOT NULL,
    last_seen         TEXT NOT NULL,
    observation_count INTEGER NOT NULL,
    success_count     INTEGER NOT NULL,
    failure_count     INTEGER NOT NULL,
    last_429          TEXT,
    PRIMARY KEY (resource_id, host, path)
);
CREATE TABLE IF NOT EXISTS learning_data (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    resource_id     TEXT NOT NULL,
    request_time    TEXT NOT NULL,
    response_code   INTEGER NOT NULL,
    success         INTEGER NOT NULL,
    response_time_ms INTEGER NOT NULL,
    command         TEXT NOT NULL,
    host            TEXT NOT NULL,
    path            TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_learning_data_resource_time
    ON learning_data (resource_id, request_time);
";

/// One append-only observation of an attempt's outcome.
#[derive(Debug, Clone)]
pub struct LearningEntry {
    /// The resource this observation concerns.
    pub resource_id: String,
    /// When the request was made.
    pub request_time: DateTime<Utc>,
    /// The child's exit code, or the HTTP status if one was parsed.
    pub response_code: i32,
    /// Whether the attempt was classified as a success.
    pub success: bool,
    /// Wall-clock time the attempt took.
    pub response_time: Duration,
    /// The command line that produced this observation, for diagnostics.
    pub command: String,
    /// The host the command targeted, if known.
    pub host: String,
    /// The path the command targeted, if known.
    pub path: String,
}

/// The discovery store's pooled SQLite handle.
#[derive(Debug, Clone)]
pub struct DiscoveryStore {
    pool: Pool<SqliteConnectionManager>,
    /// Entries (both tables) older than this without a fresh observation
    /// are eligible for pruning. `rate_limits` uses this value directly;
    /// `learning_data` uses `2 * retention`.
    retention: Duration,
}

impl DiscoveryStore {
    /// Opens (creating if absent) the SQLite database at `path`.
    pub fn open(path: &Path, retention: Duration) -> Result<Self, DiscoveryError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        });
        Self::from_manager(manager, retention)
    }

    /// Opens a private in-memory database, for tests and ephemeral runs.
    pub fn open_in_memory(retention: Duration) -> Result<Self, DiscoveryError> {
        Self::from_manager(SqliteConnectionManager::memory(), retention)
    }

    fn from_manager(manager: SqliteConnectionManager, retention: Duration) -> Result<Self, DiscoveryError> {
        let pool = Pool::builder().max_size(4).build(manager).map_err(DiscoveryError::Pool)?;
        pool.get()?.execute_batch(SCHEMA)?;
        Ok(Self { pool, retention })
    }

    /// Fetches the current fact for `(resource_id, host, path)`, if any.
    pub fn get_fact(&self, resource_id: &str, host: &str, path: &str) -> Result<Option<RateLimitFact>, DiscoveryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT limit_value, window_seconds, remaining, reset_time, source, confidence, \
             last_seen, observation_count, success_count, failure_count, last_429 \
             FROM rate_limits WHERE resource_id = ?1 AND host = ?2 AND path = ?3",
        )?;
        let fact = stmt
            .query_row(params![resource_id, host, path], |row| {
                Ok(RateLimitFact {
                    resource_id: resource_id.to_string(),
                    host: host.to_string(),
                    path: path.to_string(),
                    limit: row.get::<_, i64>(0)? as u64,
                    window: Duration::from_secs(row.get::<_, i64>(1)? as u64),
                    remaining: row.get::<_, i64>(2)? as u64,
                    reset_time: row.get(3)?,
                    source: parse_source(&row.get::<_, String>(4)?),
                    confidence: row.get(5)?,
                    last_seen: row.get(6)?,
                    observation_count: row.get::<_, i64>(7)? as u64,
                    success_count: row.get::<_, i64>(8)? as u64,
                    failure_count: row.get::<_, i64>(9)? as u64,
                    last_429: row.get(10)?,
                })
            })
            .ok();
        Ok(fact)
    }

    /// Applies the `ShouldUpdate` merge policy for a freshly
    /// observed fact, returning `true` if the stored entry changed.
    pub fn observe_fact(
        &self,
        resource_id: &str,
        host: &str,
        path: &str,
        limit: u64,
        window: Duration,
        remaining: u64,
        source: FactSource,
        is_429: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, DiscoveryError> {
        let existing = self.get_fact(resource_id, host, path)?;

        let (observation_count, success_count, failure_count) = match &existing {
            Some(e) => (
                e.observation_count + 1,
                e.success_count + u64::from(!is_429),
                e.failure_count + u64::from(is_429),
            ),
            None => (1, u64::from(!is_429), u64::from(is_429)),
        };

        let new_confidence = compute_confidence(source, observation_count, success_count, failure_count, now, now);

        let write = match &existing {
            None => true,
            Some(e) => {
                let expired = e.is_expired(now);
                should_update(e.confidence, e.source, expired, new_confidence, source)
            }
        };
        if !write {
            return Ok(false);
        }

        let reset_time = now + chrono::Duration::seconds(window.as_secs() as i64);
        let last_429 = if is_429 { Some(now) } else { existing.as_ref().and_then(|e| e.last_429) };

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO rate_limits \
             (resource_id, host, path, limit_value, window_seconds, remaining, reset_time, \
              source, confidence, last_seen, observation_count, success_count, failure_count, last_429) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
             ON CONFLICT(resource_id, host, path) DO UPDATE SET \
             limit_value = excluded.limit_value, window_seconds = excluded.window_seconds, \
             remaining = excluded.remaining, reset_time = excluded.reset_time, \
             source = excluded.source, confidence = excluded.confidence, \
             last_seen = excluded.last_seen, observation_count = excluded.observation_count, \
             success_count = excluded.success_count, failure_count = excluded.failure_count, \
             last_429 = excluded.last_429",
            params![
                resource_id,
                host,
                path,
                limit as i64,
                window.as_secs() as i64,
                remaining as i64,
                reset_time,
                source_label(source),
                new_confidence,
                now,
                observation_count as i64,
                success_count as i64,
                failure_count as i64,
                last_429,
            ],
        )?;
        Ok(true)
    }

    /// Appends one `learning_data` row.
    pub fn record_learning_entry(&self, entry: &LearningEntry) -> Result<(), DiscoveryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO learning_data \
             (resource_id, request_time, response_code, success, response_time_ms, command, host, path) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.resource_id,
                entry.request_time,
                entry.response_code,
                entry.success,
                entry.response_time.as_millis() as i64,
                entry.command,
                entry.host,
                entry.path,
            ],
        )?;
        Ok(())
    }

    /// Fetches `learning_data` entries for `resource_id` within
    /// `(now - window, now]`, oldest first.
    pub fn learning_entries_within(
        &self,
        resource_id: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<LearningEntry>, DiscoveryError> {
        let since = now - chrono::Duration::seconds(window.as_secs() as i64);
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT request_time, response_code, success, response_time_ms, command, host, path \
             FROM learning_data WHERE resource_id = ?1 AND request_time > ?2 AND request_time <= ?3 \
             ORDER BY request_time ASC",
        )?;
        let rows = stmt.query_map(params![resource_id, since, now], |row| {
            Ok(LearningEntry {
                resource_id: resource_id.to_string(),
                request_time: row.get(0)?,
                response_code: row.get(1)?,
                success: row.get(2)?,
                response_time: Duration::from_millis(row.get::<_, i64>(3)? as u64),
                command: row.get(4)?,
                host: row.get(5)?,
                path: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DiscoveryError::from)
    }

    /// Deletes `rate_limits` entries expired more than `retention` ago and
    /// `learning_data` entries older than `2 * retention`, returning the
    /// total row count removed.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, DiscoveryError> {
        let conn = self.pool.get()?;
        let facts_cutoff = now - chrono::Duration::seconds(self.retention.as_secs() as i64);
        let learning_cutoff = now - chrono::Duration::seconds(2 * self.retention.as_secs() as i64);
        let facts_removed =
            conn.execute("DELETE FROM rate_limits WHERE last_seen < ?1", params![facts_cutoff])? as u64;
        let learning_removed =
            conn.execute("DELETE FROM learning_data WHERE request_time < ?1", params![learning_cutoff])? as u64;
        Ok(facts_removed + learning_removed)
    }
}

fn source_label(source: FactSource) -> &'static str {
    match source {
        FactSource::Learned => "learned",
        FactSource::JsonBody => "json_body",
        FactSource::HttpHeader => "http_header",
        FactSource::Manual => "manual",
    }
}

fn parse_source(label: &str) -> FactSource {
    match label {
        "manual" => FactSource::Manual,
        "http_header" => FactSource::HttpHeader,
        "json_body" => FactSource::JsonBody,
        _ => FactSource::Learned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DiscoveryStore {
        DiscoveryStore::open_in_memory(Duration::from_secs(7 * 86_400)).unwrap()
    }

    #[test]
    fn first_observation_always_writes() {
        let store = store();
        let now = Utc::now();
        let wrote = store
            .observe_fact("api.github.com/repos/*", "api.github.com", "/repos/*", 60, Duration::from_secs(3600), 59, FactSource::HttpHeader, false, now)
            .unwrap();
        assert!(wrote);
        let fact = store.get_fact("api.github.com/repos/*", "api.github.com", "/repos/*").unwrap().unwrap();
        assert_eq!(fact.limit, 60);
        assert_eq!(fact.observation_count, 1);
    }

    #[test]
    fn lower_priority_source_does_not_overwrite_fresh_entry() {
        let store = store();
        let now = Utc::now();
        store
            .observe_fact("r", "h", "p", 60, Duration::from_secs(3600), 59, FactSource::Manual, false, now)
            .unwrap();
        let wrote = store
            .observe_fact("r", "h", "p", 10, Duration::from_secs(60), 1, FactSource::Learned, false, now)
            .unwrap();
        assert!(!wrote);
        let fact = store.get_fact("r", "h", "p").unwrap().unwrap();
        assert_eq!(fact.limit, 60);
    }

    #[test]
    fn learning_entries_round_trip() {
        let store = store();
        let now = Utc::now();
        store
            .record_learning_entry(&LearningEntry {
                resource_id: "r".to_string(),
                request_time: now,
                response_code: 429,
                success: false,
                response_time: Duration::from_millis(120),
                command: "curl".to_string(),
                host: "h".to_string(),
                path: "p".to_string(),
            })
            .unwrap();
        let entries = store.learning_entries_within("r", Duration::from_secs(60), now).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].response_code, 429);
    }

    #[test]
    fn prune_removes_stale_facts() {
        let store = store();
        let old = Utc::now() - chrono::Duration::days(10);
        store.observe_fact("r", "h", "p", 60, Duration::from_secs(60), 59, FactSource::Manual, false, old).unwrap();
        let removed = store.prune_expired(Utc::now()).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_fact("r", "h", "p").unwrap().is_none());
    }
}
