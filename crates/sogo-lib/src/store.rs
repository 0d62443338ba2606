//! Learner progress store.
//!
//! `SQLite` via rusqlite. One row per learner in `users` and in `progress`;
//! finished modules live as a JSON map in `progress.completed_modules`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use sogo_core::types::{CompletedModule, Progress};
use sogo_core::xp::efficiency_score;

use crate::error::{Error, Result};

/// Schema statements, run on every open.
pub mod schema {
    pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    password_hash TEXT,
    created_at TEXT
)
";

    pub const CREATE_PROGRESS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS progress (
    username TEXT PRIMARY KEY,
    current_goal TEXT,
    current_module TEXT,
    completed_modules TEXT,
    last_updated TEXT
)
";

    pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_USERS_TABLE, CREATE_PROGRESS_TABLE];
}

/// Identity comes from the external auth provider; the hash column only
/// records that the row was created on a learner's behalf.
const EXTERNAL_AUTH_MARKER: &str = "oauth_user";

/// A module the learner just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion<'a> {
    pub module: &'a str,
    /// Tutor turns it took.
    pub steps: u32,
}

#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot
    /// be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests and throwaway servers.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        initialize_schema(&conn)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the learner row if it does not exist yet. Safe to call on
    /// every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn ensure_user(&self, user_id: &str) -> Result<()> {
        let hash = blake3::hash(EXTERNAL_AUTH_MARKER.as_bytes()).to_hex();
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, hash.as_str(), Utc::now().to_rfc3339()],
        )?;
        if inserted > 0 {
            info!("New learner {user_id}");
        }
        Ok(())
    }

    #[must_use]
    pub fn user_exists(&self, user_id: &str) -> bool {
        self.conn()
            .query_row("SELECT 1 FROM users WHERE username = ?1", [user_id], |_| Ok(()))
            .optional()
            .ok()
            .flatten()
            .is_some()
    }

    /// Last known position of a learner, or `None` if they never saved any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn progress(&self, user_id: &str) -> Result<Option<Progress>> {
        let row = self
            .conn()
            .query_row(
                "SELECT current_goal, current_module, completed_modules FROM progress WHERE username = ?1",
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(goal, module, completed)| Progress {
            goal: goal.unwrap_or_default(),
            module: module.unwrap_or_default(),
            completed: parse_completed(user_id, completed.as_deref()),
        }))
    }

    /// Record the learner's current position, and optionally a module they
    /// just finished. Earlier completions are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or upsert fails.
    pub fn save_progress(
        &self,
        user_id: &str,
        goal: &str,
        module: &str,
        completion: Option<Completion<'_>>,
    ) -> Result<()> {
        let conn = self.conn();

        let existing: Option<Option<String>> = conn
            .query_row(
                "SELECT completed_modules FROM progress WHERE username = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        let mut completed = parse_completed(user_id, existing.flatten().as_deref());

        let now = Utc::now().to_rfc3339();
        if let Some(done) = completion {
            completed.insert(
                done.module.to_string(),
                CompletedModule {
                    steps: done.steps,
                    timestamp: now.clone(),
                    efficiency_score: efficiency_score(done.steps),
                },
            );
        }
        let json = serde_json::to_string(&completed)?;

        conn.execute(
            r"
            INSERT INTO progress (username, current_goal, current_module, completed_modules, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(username) DO UPDATE SET
                current_goal = excluded.current_goal,
                current_module = excluded.current_module,
                completed_modules = excluded.completed_modules,
                last_updated = excluded.last_updated
            ",
            params![user_id, goal, module, json, now],
        )?;

        debug!("Saved progress for {user_id}: {goal} / {module}");
        Ok(())
    }
}

fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in schema::SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }
    Ok(())
}

fn parse_completed(user_id: &str, raw: Option<&str>) -> BTreeMap<String, CompletedModule> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return BTreeMap::new();
    };
    let entries: BTreeMap<String, serde_json::Value> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Discarding unreadable completed modules for {user_id}: {e}");
            return BTreeMap::new();
        }
    };
    entries
        .into_iter()
        .filter_map(|(module, entry)| match serde_json::from_value(entry) {
            Ok(done) => Some((module, done)),
            Err(e) => {
                warn!("Discarding completed module {module:?} for {user_id}: {e}");
                None
            }
        })
        .collect()
}
