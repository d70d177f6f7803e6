//! SQLite store for repositories, subscriptions and star history.
//!
//! One connection behind a mutex; every call is a short synchronous query, so
//! the lock is never held across an await.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use starwatch_core::error::{Result, StarwatchError};
use starwatch_core::traits::{RepoStore, SubscriptionStore};
use starwatch_core::types::{RepoInfo, StarEvent, TrackedRepo};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const REPO_COLUMNS: &str = "id, name, full_name, stars, last_checked, archived";

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> StarwatchError {
    StarwatchError::Store(e.to_string())
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn repo_from_row(row: &Row<'_>) -> rusqlite::Result<TrackedRepo> {
    let last_checked: Option<String> = row.get(4)?;
    Ok(TrackedRepo {
        id: row.get(0)?,
        name: row.get(1)?,
        full_name: row.get(2)?,
        stars: row.get(3)?,
        last_checked: last_checked.as_deref().and_then(parse_ts),
        archived: row.get::<_, i32>(5)? != 0,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<StarEvent> {
    let created_at: String = row.get(4)?;
    Ok(StarEvent {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        previous: row.get(2)?,
        current: row.get(3)?,
        created_at: parse_ts(&created_at).unwrap_or_else(Utc::now),
    })
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(db_err)?;
        // WAL for concurrent readers. A store that can't switch still works,
        // so a refusal only warns.
        match conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        }) {
            Ok(mode) if mode.eq_ignore_ascii_case("wal") => {
                tracing::debug!("💾 Journal mode: {mode}");
            }
            Ok(mode) => tracing::warn!("⚠️ SQLite kept journal mode {mode}, WAL unavailable"),
            Err(e) => tracing::warn!("⚠️ Failed to enable WAL: {e}"),
        }
        Self::init(conn)
    }

    /// Fresh in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;").map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StarwatchError::Store(format!("Lock: {e}")))
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS repositories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                full_name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                stars INTEGER NOT NULL DEFAULT 0,
                last_checked TEXT,
                archived INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS subscribers (
                chat_id INTEGER PRIMARY KEY,
                username TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS subscriptions (
                chat_id INTEGER NOT NULL REFERENCES subscribers(chat_id) ON DELETE CASCADE,
                repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                PRIMARY KEY (chat_id, repo_id)
            );

            -- append-only star gain history
            CREATE TABLE IF NOT EXISTS star_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
                previous INTEGER NOT NULL,
                current INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_subscriptions_repo ON subscriptions(repo_id);
            CREATE INDEX IF NOT EXISTS idx_star_events_repo ON star_events(repo_id, id);
            ",
        )
        .map_err(|e| StarwatchError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    /// Look up a repository by `owner/name` (case-insensitive).
    pub fn find_repo(&self, full_name: &str) -> Result<Option<TrackedRepo>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {REPO_COLUMNS} FROM repositories WHERE full_name = ?1"),
            params![full_name],
            repo_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    /// Most recent star events for a repository, newest first.
    pub fn recent_events(&self, repo_id: i64, limit: usize) -> Result<Vec<StarEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, repo_id, previous, current, created_at FROM star_events
                 WHERE repo_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(db_err)?;
        let events = stmt
            .query_map(params![repo_id, limit as i64], event_from_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(events)
    }
}

#[async_trait]
impl RepoStore for SqliteStore {
    async fn list_tracked(&self) -> Result<Vec<TrackedRepo>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {REPO_COLUMNS} FROM repositories WHERE archived = 0 ORDER BY id"
            ))
            .map_err(db_err)?;
        let repos = stmt
            .query_map([], repo_from_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(repos)
    }

    async fn update_stars(&self, repo_id: i64, stars: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE repositories SET stars = ?1, last_checked = ?2 WHERE id = ?3",
                params![stars, Utc::now().to_rfc3339(), repo_id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(StarwatchError::NotFound(format!("repository {repo_id}")));
        }
        Ok(())
    }

    async fn record_star_event(
        &self,
        repo_id: i64,
        current: i64,
        previous: i64,
    ) -> Result<StarEvent> {
        let conn = self.conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO star_events (repo_id, previous, current, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![repo_id, previous, current, created_at.to_rfc3339()],
        )
        .map_err(db_err)?;
        Ok(StarEvent {
            id: conn.last_insert_rowid(),
            repo_id,
            previous,
            current,
            created_at,
        })
    }

    async fn list_subscribers(&self, repo_id: i64) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT chat_id FROM subscriptions WHERE repo_id = ?1 ORDER BY created_at, chat_id")
            .map_err(db_err)?;
        let ids = stmt
            .query_map(params![repo_id], |row| row.get(0))
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<i64>>>()
            .map_err(db_err)?;
        Ok(ids)
    }
}

#[async_trait]
impl SubscriptionStore for SqliteStore {
    async fn add_subscriber(&self, chat_id: i64, username: Option<&str>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO subscribers (chat_id, username, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET username = COALESCE(excluded.username, username)",
            params![chat_id, username, Utc::now().to_rfc3339()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn upsert_repo(&self, info: &RepoInfo) -> Result<TrackedRepo> {
        {
            let conn = self.conn()?;
            // New and revived rows start from the current count so existing
            // stars never alert. A live row keeps its own baseline.
            conn.execute(
                "INSERT INTO repositories (name, full_name, stars, archived, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)
                 ON CONFLICT(full_name) DO UPDATE SET
                     name = excluded.name,
                     stars = CASE WHEN archived = 1 THEN excluded.stars ELSE stars END,
                     last_checked = CASE WHEN archived = 1 THEN NULL ELSE last_checked END,
                     archived = 0",
                params![info.name, info.full_name, info.stargazers_count, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
        }
        self.find_repo(&info.full_name)?
            .ok_or_else(|| StarwatchError::NotFound(info.full_name.clone()))
    }

    async fn subscribe(&self, chat_id: i64, repo_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO subscriptions (chat_id, repo_id, created_at) VALUES (?1, ?2, ?3)",
                params![chat_id, repo_id, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
        Ok(inserted == 1)
    }

    async fn unsubscribe(&self, chat_id: i64, full_name: &str) -> Result<bool> {
        let Some(repo) = self.find_repo(full_name)? else {
            return Ok(false);
        };

        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM subscriptions WHERE chat_id = ?1 AND repo_id = ?2",
                params![chat_id, repo.id],
            )
            .map_err(db_err)?;

        let remaining: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE repo_id = ?1",
                params![repo.id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        if remaining == 0 {
            conn.execute(
                "UPDATE repositories SET archived = 1 WHERE id = ?1",
                params![repo.id],
            )
            .map_err(db_err)?;
            tracing::info!("🗄️ Archived {} (no subscribers left)", repo.full_name);
        }

        Ok(removed > 0)
    }

    async fn list_subscriptions(&self, chat_id: i64) -> Result<Vec<TrackedRepo>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT r.id, r.name, r.full_name, r.stars, r.last_checked, r.archived
                 FROM repositories r
                 JOIN subscriptions s ON s.repo_id = r.id
                 WHERE s.chat_id = ?1
                 ORDER BY r.full_name COLLATE NOCASE",
            )
            .map_err(db_err)?;
        let repos = stmt
            .query_map(params![chat_id], repo_from_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(repos)
    }
}
