use chrono::{DateTime, Duration, Utc};

use crate::models::{LogLevel, LogRecord, StatsSummary};

/// Summarise `records`, looking back 24 hours from `now`.
pub fn summarize(records: &[LogRecord], now: DateTime<Utc>) -> StatsSummary {
    let since = now - Duration::hours(24);

    let mut errors = 0u64;
    let mut warnings = 0u64;
    let mut successes = 0u64;

    for record in records.iter().filter(|r| r.timestamp >= since) {
        match record.level {
            LogLevel::Error => errors += 1,
            LogLevel::Warning => warnings += 1,
            level if level.is_success() => successes += 1,
            _ => {}
        }
    }

    let recent = errors + warnings + successes;
    let success_rate = if recent == 0 {
        100
    } else {
        (successes as f64 / recent as f64 * 100.0).round() as u32
    };

    StatsSummary {
        total_logs: records.len() as u64,
        errors_24h: errors,
        warnings_24h: warnings,
        success_rate,
    }
}
