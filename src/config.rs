use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Raw entry layout the log reader expects to find in Redis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogSourceKind {
    /// One list key holding a JSON object per entry
    #[default]
    List,
    /// One hash per entry under `event:<id>` / `log:<id>` style keys (deprecated)
    Hash,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "rediswatch", version, about = "Browse and filter logs stored in Redis")]
pub struct Config {
    /// Address the HTTP API listens on
    #[arg(long, env = "REDISWATCH_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// SQLite file holding the connection registry
    #[arg(long, env = "REDISWATCH_DB", default_value = "rediswatch.db")]
    pub database: PathBuf,

    #[arg(long, env = "REDISWATCH_LOG_SOURCE", value_enum, default_value_t = LogSourceKind::List)]
    pub log_source: LogSourceKind,

    /// List key read by the list source
    #[arg(long, env = "REDISWATCH_LIST_KEY", default_value = "LOGS")]
    pub list_key: String,

    /// Key patterns scanned by the hash source
    #[arg(
        long = "hash-pattern",
        env = "REDISWATCH_HASH_PATTERN",
        value_delimiter = ',',
        default_values = ["event:*", "log:*"]
    )]
    pub hash_patterns: Vec<String>,

    /// Allowed CORS origin; any origin is accepted when unset
    #[arg(long, env = "REDISWATCH_CORS_ORIGIN")]
    pub cors_origin: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_read_the_logs_list() {
        let config = Config::try_parse_from(["rediswatch"]).unwrap();
        assert_eq!(config.log_source, LogSourceKind::List);
        assert_eq!(config.list_key, "LOGS");
        assert_eq!(config.hash_patterns, vec!["event:*", "log:*"]);
        assert_eq!(config.bind.port(), 5000);
    }

    #[test]
    fn hash_source_with_custom_patterns() {
        let config = Config::try_parse_from([
            "rediswatch",
            "--log-source",
            "hash",
            "--hash-pattern",
            "audit:*,trail:*",
        ])
        .unwrap();
        assert_eq!(config.log_source, LogSourceKind::Hash);
        assert_eq!(config.hash_patterns, vec!["audit:*", "trail:*"]);
    }
}
