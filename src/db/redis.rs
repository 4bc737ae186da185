use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Instant;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, FromRedisValue, RedisError, RedisResult, Value};

use crate::config::{Config, LogSourceKind};
use crate::logs::RawEntry;
use crate::models::ConnectionProfile;

const SCAN_BATCH: usize = 500;

/// Build a connection URL with the password URL-encoded
fn build_connection_url(profile: &ConnectionProfile) -> String {
    let host = if profile.host.contains(':') {
        format!("[{}]", profile.host)
    } else {
        profile.host.clone()
    };

    match profile.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => format!(
            "redis://:{}@{}:{}/{}",
            urlencoding::encode(password),
            host,
            profile.port,
            profile.database
        ),
        None => format!("redis://{}:{}/{}", host, profile.port, profile.database),
    }
}

/// Open a new multiplexed connection for the given profile
pub async fn connect(profile: &ConnectionProfile) -> RedisResult<MultiplexedConnection> {
    let client = redis::Client::open(build_connection_url(profile))?;
    client.get_multiplexed_async_connection().await
}

/// Redis clients shared between requests, one per `host:port:database`.
///
/// A multiplexed connection is cheap to clone and queues commands from every
/// clone over the same socket.
#[derive(Default)]
pub struct ClientPool {
    clients: Mutex<HashMap<String, MultiplexedConnection>>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the pooled client for `profile`, connecting on first use
    pub async fn get(&self, profile: &ConnectionProfile) -> RedisResult<MultiplexedConnection> {
        let key = profile.pool_key();

        if let Some(conn) = self.lookup(&key) {
            return Ok(conn);
        }

        let conn = connect(profile).await?;
        log::info!("Opened Redis client for {}", key);

        // Another request may have connected meanwhile; keep the first one
        let mut clients = self.lock();
        Ok(clients.entry(key).or_insert(conn).clone())
    }

    fn lookup(&self, key: &str) -> Option<MultiplexedConnection> {
        self.lock().get(key).cloned()
    }

    /// Check if a client exists for the key
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Drop the client for the key; the next `get` reconnects
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.lock().remove(key).is_some();
        if removed {
            log::info!("Closed Redis client for {}", key);
        }
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MultiplexedConnection>> {
        // The map stays consistent even if a holder panicked
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// PING the profile's server through the pool and return the round-trip in ms
pub async fn ping(pool: &ClientPool, profile: &ConnectionProfile) -> RedisResult<u64> {
    let start = Instant::now();

    let mut conn = pool.get(profile).await?;
    let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
    if pong != "PONG" {
        return Err(RedisError::from((
            redis::ErrorKind::ResponseError,
            "unexpected reply to PING",
            pong,
        )));
    }

    Ok(start.elapsed().as_millis() as u64)
}

/// Where raw log entries live inside a Redis database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    /// A list of JSON documents
    List { key: String },
    /// One hash per entry, found by key pattern. Kept for older producers.
    Hash { patterns: Vec<String> },
}

impl LogSource {
    pub fn from_config(config: &Config) -> Self {
        match config.log_source {
            LogSourceKind::List => LogSource::List {
                key: config.list_key.clone(),
            },
            LogSourceKind::Hash => LogSource::Hash {
                patterns: config.hash_patterns.clone(),
            },
        }
    }

    /// Read every raw entry. A missing list key reads as empty.
    ///
    /// Replies are kept as bytes; a bad element or key becomes one entry that
    /// fails to decode instead of failing the whole read.
    pub async fn read_raw(&self, conn: &mut MultiplexedConnection) -> RedisResult<Vec<RawEntry>> {
        match self {
            LogSource::List { key } => {
                let items: Vec<Vec<u8>> = conn.lrange(key, 0, -1).await?;
                Ok(items
                    .into_iter()
                    .enumerate()
                    .map(|(index, bytes)| RawEntry::Json { index, bytes })
                    .collect())
            }
            LogSource::Hash { patterns } => {
                let keys = scan_keys(conn, patterns).await?;
                read_hashes(conn, keys).await
            }
        }
    }
}

/// Fetch all fields of every key that holds a hash: one pipeline of `TYPE`,
/// then one of `HGETALL`.
/// Keys of any other type come back as [`RawEntry::Unreadable`].
async fn read_hashes(conn: &mut MultiplexedConnection, keys: Vec<String>) -> RedisResult<Vec<RawEntry>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let mut pipe = redis::pipe();
    for key in &keys {
        pipe.cmd("TYPE").arg(key);
    }
    let types: Vec<String> = pipe.query_async(&mut *conn).await?;

    let mut entries = Vec::with_capacity(keys.len());
    let mut hash_keys = Vec::new();
    for (key, kind) in keys.into_iter().zip(types) {
        match kind.as_str() {
            "hash" => hash_keys.push(key),
            // Deleted since the scan
            "none" => {}
            other => entries.push(RawEntry::Unreadable {
                key,
                reason: format!("key holds a {} value, not a hash", other),
            }),
        }
    }
    if hash_keys.is_empty() {
        return Ok(entries);
    }

    let mut pipe = redis::pipe();
    for key in &hash_keys {
        pipe.hgetall(key);
    }
    let replies: Vec<Value> = pipe.query_async(&mut *conn).await?;

    for (key, reply) in hash_keys.into_iter().zip(replies) {
        let raw: RedisResult<HashMap<Vec<u8>, Vec<u8>>> = FromRedisValue::from_redis_value(&reply);
        match raw {
            Ok(raw) => {
                let fields = raw
                    .into_iter()
                    .map(|(name, value)| (String::from_utf8_lossy(&name).into_owned(), value))
                    .collect();
                entries.push(RawEntry::Hash { key, fields });
            }
            Err(e) => entries.push(RawEntry::Unreadable {
                key,
                reason: e.to_string(),
            }),
        }
    }

    // Keep the key order of the scan
    entries.sort_by(|a, b| raw_key(a).cmp(raw_key(b)));
    Ok(entries)
}

fn raw_key(entry: &RawEntry) -> &str {
    match entry {
        RawEntry::Hash { key, .. } | RawEntry::Unreadable { key, .. } => key,
        RawEntry::Json { .. } => "",
    }
}

/// Whether the client itself is unusable, as opposed to one bad reply
pub fn is_connection_error(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
}

/// Collect keys matching any pattern, sorted so repeated reads agree on order
async fn scan_keys(conn: &mut MultiplexedConnection, patterns: &[String]) -> RedisResult<Vec<String>> {
    let mut keys = BTreeSet::new();

    for pattern in patterns {
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
    }

    Ok(keys.into_iter().collect())
}
