use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REDIS_PORT: u16 = 6379;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
    Connecting,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(ConnectionStatus::Connected),
            "disconnected" => Ok(ConnectionStatus::Disconnected),
            "connecting" => Ok(ConnectionStatus::Connecting),
            "error" => Ok(ConnectionStatus::Error),
            other => Err(format!("unknown connection status: {}", other)),
        }
    }
}

/// A stored description of how to reach one Redis instance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub id: i64,
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Never sent back to clients; `has_password` tells them whether one is set.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub has_password: bool,
    pub database: u32,
    pub status: ConnectionStatus,
    pub last_connected: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ConnectionProfile {
    /// Key shared by every profile pointing at the same logical Redis database.
    pub fn pool_key(&self) -> String {
        format!("{}:{}:{}", self.host, self.port, self.database)
    }
}

/// Payload for registering a new connection profile
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConnection {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<u32>,
}

/// Partial update of a connection profile; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// An empty string clears the stored password.
    pub password: Option<String>,
    pub database: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    #[serde(flatten)]
    pub profile: ConnectionProfile,
    /// Whether a pooled client currently exists for this profile
    pub pooled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionResult {
    pub success: bool,
    pub message: String,
    pub latency_ms: Option<u64>,
}

fn validation_errors(name: Option<&str>, host: Option<&str>, port: Option<u16>) -> Vec<String> {
    let mut errors = Vec::new();
    if matches!(name, Some(n) if n.trim().is_empty()) {
        errors.push("name: must not be empty".to_string());
    }
    if matches!(host, Some(h) if h.trim().is_empty()) {
        errors.push("host: must not be empty".to_string());
    }
    if port == Some(0) {
        errors.push("port: must be between 1 and 65535".to_string());
    }
    errors
}

impl NewConnection {
    /// Returns the list of field errors, empty when the payload is acceptable.
    pub fn validate(&self) -> Vec<String> {
        validation_errors(Some(&self.name), Some(&self.host), self.port)
    }
}

impl ConnectionUpdate {
    pub fn validate(&self) -> Vec<String> {
        validation_errors(self.name.as_deref(), self.host.as_deref(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_text_form() {
        for status in [
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<ConnectionStatus>(), Ok(status));
        }
        assert!("online".parse::<ConnectionStatus>().is_err());
    }

    #[test]
    fn new_connection_rejects_blank_fields_and_port_zero() {
        let input = NewConnection {
            name: "  ".to_string(),
            host: String::new(),
            port: Some(0),
            password: None,
            database: None,
        };
        assert_eq!(input.validate().len(), 3);
    }

    #[test]
    fn update_only_checks_supplied_fields() {
        assert!(ConnectionUpdate::default().validate().is_empty());
        let update = ConnectionUpdate {
            host: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(update.validate(), vec!["host: must not be empty".to_string()]);
    }

    #[test]
    fn password_is_not_serialized() {
        let profile = ConnectionProfile {
            id: 1,
            name: "prod".to_string(),
            host: "localhost".to_string(),
            port: 6379,
            password: Some("hunter2".to_string()),
            has_password: true,
            database: 0,
            status: ConnectionStatus::Disconnected,
            last_connected: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"hasPassword\":true"));
        assert_eq!(profile.pool_key(), "localhost:6379:0");
    }
}
