use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, Row};
use std::path::Path;

use crate::models::{ConnectionProfile, ConnectionStatus, ConnectionUpdate, NewConnection, DEFAULT_REDIS_PORT};

const PROFILE_COLUMNS: &str =
    "id, name, host, port, password, db_index, status, last_connected, created_at";

/// Open the registry database at `path`, creating the file and tables as needed
pub fn init_database(path: &Path) -> crate::error::Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    create_tables(&conn)?;
    Ok(conn)
}

/// Fresh registry that lives only as long as the connection
pub fn init_in_memory() -> SqliteResult<Connection> {
    let conn = Connection::open_in_memory()?;
    create_tables(&conn)?;
    Ok(conn)
}

fn create_tables(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        r#"
        -- Redis connection profiles
        CREATE TABLE IF NOT EXISTS redis_connections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            host TEXT NOT NULL,
            port INTEGER NOT NULL DEFAULT 6379,
            password TEXT,
            db_index INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'disconnected',
            last_connected TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
}

fn row_to_profile(row: &Row<'_>) -> SqliteResult<ConnectionProfile> {
    let password: Option<String> = row.get(4)?;
    let status: String = row.get(6)?;
    let status = status
        .parse::<ConnectionStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into()))?;

    Ok(ConnectionProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        host: row.get(2)?,
        port: row.get(3)?,
        has_password: password.as_deref().is_some_and(|p| !p.is_empty()),
        password,
        database: row.get(5)?,
        status,
        last_connected: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert a new profile; it starts out disconnected
pub fn create_connection(conn: &Connection, input: &NewConnection) -> SqliteResult<ConnectionProfile> {
    let password = input.password.as_deref().filter(|p| !p.is_empty());

    conn.execute(
        r#"
        INSERT INTO redis_connections (name, host, port, password, db_index, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        (
            input.name.trim(),
            input.host.trim(),
            input.port.unwrap_or(DEFAULT_REDIS_PORT),
            password,
            input.database.unwrap_or(0),
            ConnectionStatus::Disconnected.as_str(),
            Utc::now(),
        ),
    )?;

    let id = conn.last_insert_rowid();
    get_connection(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Load all profiles, oldest first
pub fn load_connections(conn: &Connection) -> SqliteResult<Vec<ConnectionProfile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM redis_connections ORDER BY id",
        PROFILE_COLUMNS
    ))?;

    let profiles = stmt.query_map([], row_to_profile)?;
    profiles.collect()
}

/// Get a single profile by ID
pub fn get_connection(conn: &Connection, id: i64) -> SqliteResult<Option<ConnectionProfile>> {
    conn.query_row(
        &format!("SELECT {} FROM redis_connections WHERE id = ?1", PROFILE_COLUMNS),
        [id],
        row_to_profile,
    )
    .optional()
}

/// The profile used when a request does not name one
pub fn first_connection(conn: &Connection) -> SqliteResult<Option<ConnectionProfile>> {
    conn.query_row(
        &format!("SELECT {} FROM redis_connections ORDER BY id LIMIT 1", PROFILE_COLUMNS),
        [],
        row_to_profile,
    )
    .optional()
}

/// Apply a partial update, returning the stored result
pub fn update_connection(
    conn: &Connection,
    id: i64,
    update: &ConnectionUpdate,
) -> SqliteResult<Option<ConnectionProfile>> {
    let Some(mut profile) = get_connection(conn, id)? else {
        return Ok(None);
    };

    if let Some(ref name) = update.name {
        profile.name = name.trim().to_string();
    }
    if let Some(ref host) = update.host {
        profile.host = host.trim().to_string();
    }
    if let Some(port) = update.port {
        profile.port = port;
    }
    if let Some(ref password) = update.password {
        profile.password = Some(password.clone()).filter(|p| !p.is_empty());
    }
    if let Some(database) = update.database {
        profile.database = database;
    }

    conn.execute(
        r#"
        UPDATE redis_connections
        SET name = ?1, host = ?2, port = ?3, password = ?4, db_index = ?5
        WHERE id = ?6
        "#,
        (
            &profile.name,
            &profile.host,
            profile.port,
            &profile.password,
            profile.database,
            id,
        ),
    )?;

    get_connection(conn, id)
}

/// Record the outcome of a connection attempt.
/// `last_connected` is only overwritten when a value is given.
pub fn set_status(
    conn: &Connection,
    id: i64,
    status: ConnectionStatus,
    last_connected: Option<DateTime<Utc>>,
) -> SqliteResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE redis_connections
        SET status = ?1, last_connected = COALESCE(?2, last_connected)
        WHERE id = ?3
        "#,
        (status.as_str(), last_connected, id),
    )?;
    Ok(rows_affected > 0)
}

/// Delete a profile
pub fn delete_connection(conn: &Connection, id: i64) -> SqliteResult<bool> {
    let rows_affected = conn.execute("DELETE FROM redis_connections WHERE id = ?1", [id])?;
    Ok(rows_affected > 0)
}
