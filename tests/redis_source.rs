//! Log reading against a minimal in-process RESP server.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};

use rediswatch_lib::db::redis::{ClientPool, LogSource};
use rediswatch_lib::db::sqlite;
use rediswatch_lib::logs::LogReader;
use rediswatch_lib::models::{ConnectionProfile, FilterCriteria, LogLevel, NewConnection, StatsSummary};

enum Stored {
    List(Vec<Vec<u8>>),
    Hash(Vec<(Vec<u8>, Vec<u8>)>),
    Plain(Vec<u8>),
}

type Store = BTreeMap<String, Stored>;

/// Serve `store` on an ephemeral port until the test ends
async fn serve(store: Store) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let store = Arc::new(store);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handle(stream, store.clone()));
        }
    });

    port
}

async fn handle(stream: TcpStream, store: Arc<Store>) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    while let Some(args) = read_command(&mut reader).await {
        if write.write_all(&respond(&store, &args)).await.is_err() {
            break;
        }
    }
}

async fn read_command(reader: &mut BufReader<OwnedReadHalf>) -> Option<Vec<Vec<u8>>> {
    let count = read_length(reader, b'*').await?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len = read_length(reader, b'$').await?;
        let mut arg = vec![0; len + 2];
        reader.read_exact(&mut arg).await.ok()?;
        arg.truncate(len);
        args.push(arg);
    }
    Some(args)
}

async fn read_length(reader: &mut BufReader<OwnedReadHalf>, prefix: u8) -> Option<usize> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line).await.ok()? == 0 {
        return None;
    }
    let digits = line.strip_prefix(&[prefix])?;
    std::str::from_utf8(digits).ok()?.trim_end().parse().ok()
}

fn respond(store: &Store, args: &[Vec<u8>]) -> Vec<u8> {
    let arg = |i: usize| String::from_utf8_lossy(&args[i]).into_owned();
    let mut out = Vec::new();

    match arg(0).to_ascii_uppercase().as_str() {
        "PING" => out.extend_from_slice(b"+PONG\r\n"),
        "LRANGE" => match store.get(&arg(1)) {
            Some(Stored::List(items)) => array(&mut out, items.iter().map(Vec::as_slice)),
            Some(_) => wrong_type(&mut out),
            None => array(&mut out, []),
        },
        "TYPE" => {
            let kind = match store.get(&arg(1)) {
                Some(Stored::List(_)) => "list",
                Some(Stored::Hash(_)) => "hash",
                Some(Stored::Plain(_)) => "string",
                None => "none",
            };
            out.extend_from_slice(format!("+{}\r\n", kind).as_bytes());
        }
        "HGETALL" => match store.get(&arg(1)) {
            Some(Stored::Hash(fields)) => array(
                &mut out,
                fields.iter().flat_map(|(k, v)| [k.as_slice(), v.as_slice()]),
            ),
            Some(_) => wrong_type(&mut out),
            None => array(&mut out, []),
        },
        // One key per page so the cursor loop has to follow up
        "SCAN" => {
            let cursor: usize = arg(1).parse().unwrap();
            let pattern = arg(3);
            let matches: Vec<&String> = store.keys().filter(|k| glob(&pattern, k)).collect();
            let next = if cursor + 1 < matches.len() { cursor + 1 } else { 0 };

            out.extend_from_slice(b"*2\r\n");
            bulk(&mut out, next.to_string().as_bytes());
            array(&mut out, matches.get(cursor).map(|k| k.as_bytes()));
        }
        // Handshake commands such as CLIENT SETINFO
        _ => out.extend_from_slice(b"+OK\r\n"),
    }

    out
}

fn glob(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

fn bulk(out: &mut Vec<u8>, value: &[u8]) {
    out.extend_from_slice(format!("${}\r\n", value.len()).as_bytes());
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}

fn array<'a>(out: &mut Vec<u8>, items: impl IntoIterator<Item = &'a [u8]>) {
    let items: Vec<&[u8]> = items.into_iter().collect();
    out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
    for item in items {
        bulk(out, item);
    }
}

fn wrong_type(out: &mut Vec<u8>) {
    out.extend_from_slice(b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n");
}

fn profile(port: u16) -> ConnectionProfile {
    let db = sqlite::init_in_memory().unwrap();
    sqlite::create_connection(
        &db,
        &NewConnection {
            name: "local".to_string(),
            host: "127.0.0.1".to_string(),
            port: Some(port),
            password: None,
            database: None,
        },
    )
    .unwrap()
}

fn list_element(level: &str, message: &str, at: DateTime<Utc>) -> Vec<u8> {
    json!({
        "log_level": level,
        "message": message,
        "username": "worker",
        "datetime": at.to_rfc3339(),
    })
    .to_string()
    .into_bytes()
}

fn hash(fields: &[(&str, &str)]) -> Stored {
    Stored::Hash(
        fields
            .iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect(),
    )
}

fn list_reader() -> LogReader {
    LogReader::new(LogSource::List {
        key: "LOGS".to_string(),
    })
}

fn list_store(now: DateTime<Utc>) -> Store {
    let mut store = Store::new();
    store.insert(
        "LOGS".to_string(),
        Stored::List(vec![
            list_element("info", "started", now - Duration::hours(2)),
            b"{\xff\xfe}".to_vec(),
            list_element("error", "crashed", now - Duration::hours(1)),
            b"not json".to_vec(),
            list_element("info", "nightly backup", now - Duration::days(3)),
        ]),
    );
    store
}

#[tokio::test]
async fn list_source_skips_undecodable_elements() {
    let port = serve(list_store(Utc::now())).await;
    let target = profile(port);
    let pool = ClientPool::new();

    let page = list_reader()
        .fetch(&pool, &target, &FilterCriteria::default())
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.skipped, 2);
    let ids: Vec<&str> = page.logs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "0", "4"]);
    assert!(page.logs.iter().all(|r| r.connection_id == target.id));

    // Bad entries are not a connection problem
    assert!(pool.contains(&target.pool_key()));
}

#[tokio::test]
async fn list_source_applies_filters_to_decoded_records() {
    let port = serve(list_store(Utc::now())).await;
    let target = profile(port);
    let pool = ClientPool::new();
    let criteria = FilterCriteria {
        level: Some(LogLevel::Error),
        ..Default::default()
    };

    let page = list_reader().fetch(&pool, &target, &criteria).await.unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.skipped, 2);
    assert_eq!(page.logs[0].message, "crashed");
}

#[tokio::test]
async fn repeated_fetches_return_the_same_page() {
    let port = serve(list_store(Utc::now())).await;
    let target = profile(port);
    let pool = ClientPool::new();
    let reader = list_reader();
    let criteria = FilterCriteria {
        page: 2,
        limit: 2,
        ..Default::default()
    };

    let first = reader.fetch(&pool, &target, &criteria).await.unwrap();
    let second = reader.fetch(&pool, &target, &criteria).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.logs.len(), 1);
    assert_eq!(first.total, 3);
}

#[tokio::test]
async fn stats_cover_decodable_entries_only() {
    let port = serve(list_store(Utc::now())).await;
    let target = profile(port);

    let stats = list_reader().stats(&ClientPool::new(), &target).await;

    assert_eq!(
        stats,
        StatsSummary {
            total_logs: 3,
            errors_24h: 1,
            warnings_24h: 0,
            success_rate: 50,
        }
    );
}

#[tokio::test]
async fn missing_list_key_reads_as_empty() {
    let port = serve(Store::new()).await;
    let target = profile(port);

    let page = list_reader()
        .fetch(&ClientPool::new(), &target, &FilterCriteria::default())
        .await
        .unwrap();

    assert_eq!(page.total, 0);
    assert_eq!(page.skipped, 0);
    assert!(page.logs.is_empty());
}

#[tokio::test]
async fn hash_source_follows_the_scan_cursor_and_skips_bad_keys() {
    let now = Utc::now();
    let at = |hours: i64| (now - Duration::hours(hours)).to_rfc3339();
    let (first, second, third) = (at(3), at(2), at(1));

    let mut store = Store::new();
    store.insert(
        "log:1".to_string(),
        hash(&[
            ("log_level", "info"),
            ("message", "first"),
            ("username", "worker"),
            ("datetime", first.as_str()),
        ]),
    );
    store.insert(
        "log:2".to_string(),
        hash(&[
            ("level", "warning"),
            ("message", "second"),
            ("service", "api"),
            ("timestamp", second.as_str()),
            ("metadata", r#"{"elapsedMs":3200}"#),
        ]),
    );
    store.insert(
        "event:7".to_string(),
        hash(&[
            ("log_level", "ERROR"),
            ("message", "third"),
            ("username", "worker"),
            ("datetime", third.as_str()),
        ]),
    );
    store.insert("log:count".to_string(), Stored::Plain(b"3".to_vec()));
    // Message bytes are not valid UTF-8
    store.insert(
        "log:9".to_string(),
        Stored::Hash(vec![
            (b"log_level".to_vec(), b"info".to_vec()),
            (b"message".to_vec(), b"\xc3\x28".to_vec()),
            (b"username".to_vec(), b"worker".to_vec()),
            (b"datetime".to_vec(), third.as_bytes().to_vec()),
        ]),
    );
    store.insert("LOGS".to_string(), Stored::List(Vec::new()));

    let port = serve(store).await;
    let target = profile(port);
    let pool = ClientPool::new();
    let reader = LogReader::new(LogSource::Hash {
        patterns: vec!["event:*".to_string(), "log:*".to_string()],
    });

    let page = reader.fetch(&pool, &target, &FilterCriteria::default()).await.unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.skipped, 2);
    let ids: Vec<&str> = page.logs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["7", "2", "1"]);
    assert_eq!(page.logs[1].service, "api");
    assert_eq!(page.logs[1].metadata.as_ref().unwrap()["elapsedMs"], 3200);
    assert!(pool.contains(&target.pool_key()));
}
