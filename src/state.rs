use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection as SqliteConnection;

use crate::db::redis::{ClientPool, LogSource};
use crate::error::{AppError, Result};
use crate::logs::LogReader;
use crate::models::ConnectionProfile;

/// Application state shared by all request handlers
pub struct AppState {
    /// Local SQLite database holding the connection registry
    pub metadata_db: Mutex<SqliteConnection>,

    /// Redis clients, keyed by `host:port:database`
    pub clients: ClientPool,

    pub reader: LogReader,
}

impl AppState {
    pub fn new(metadata_db: SqliteConnection, source: LogSource) -> Self {
        Self {
            metadata_db: Mutex::new(metadata_db),
            clients: ClientPool::new(),
            reader: LogReader::new(source),
        }
    }

    /// Run `f` against the registry database.
    /// Synchronous so the lock can never be held across an `.await`.
    pub fn with_db<T>(
        &self,
        f: impl FnOnce(&SqliteConnection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let db: MutexGuard<'_, SqliteConnection> = self
            .metadata_db
            .lock()
            .map_err(|e| AppError::Internal(format!("connection store unavailable: {}", e)))?;
        Ok(f(&db)?)
    }

    /// Load a profile or fail with not-found
    pub fn profile(&self, id: i64) -> Result<ConnectionProfile> {
        self.with_db(|db| crate::db::sqlite::get_connection(db, id))?
            .ok_or_else(|| AppError::connection_not_found(id))
    }

    /// Check if a pooled client exists for the profile
    pub fn has_client(&self, profile: &ConnectionProfile) -> bool {
        self.clients.contains(&profile.pool_key())
    }

    /// Drop the pooled client of a profile
    pub fn remove_client(&self, profile: &ConnectionProfile) -> bool {
        self.clients.remove(&profile.pool_key())
    }
}
