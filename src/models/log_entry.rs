use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    /// Info and debug entries count towards the success rate.
    pub fn is_success(&self) -> bool {
        matches!(self, LogLevel::Info | LogLevel::Debug)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

/// A validated log entry decoded from one raw Redis entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: String,
    pub connection_id: i64,
    /// Producer-assigned event identifier, when the entry carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    /// Originating service, or the acting username for list-shaped sources
    pub service: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Query string of `GET /api/logs`, kept as raw text until validated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub connection_id: Option<String>,
    pub level: Option<String>,
    pub service: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub level: Option<LogLevel>,
    pub service: Option<String>,
    /// Stored lowercased
    pub search: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub page: usize,
    pub limit: usize,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        FilterCriteria {
            level: None,
            service: None,
            search: None,
            start: None,
            end: None,
            start_time: None,
            end_time: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub logs: Vec<LogRecord>,
    /// Number of records matching the filters, before pagination
    pub total: usize,
    /// Raw entries dropped because they could not be decoded
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_logs: u64,
    pub errors_24h: u64,
    pub warnings_24h: u64,
    pub success_rate: u32,
}

impl Default for StatsSummary {
    fn default() -> Self {
        StatsSummary {
            total_logs: 0,
            errors_24h: 0,
            warnings_24h: 0,
            success_rate: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_ignores_case() {
        assert_eq!("ERROR".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert_eq!("Error".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!(" Debug ".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("fatal".parse::<LogLevel>().is_err());
    }

    #[test]
    fn stats_summary_serializes_with_dashboard_field_names() {
        let json = serde_json::to_value(StatsSummary::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "totalLogs": 0,
                "errors24h": 0,
                "warnings24h": 0,
                "successRate": 100
            })
        );
    }
}
