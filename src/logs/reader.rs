use chrono::Utc;

use crate::db::redis::{is_connection_error, ClientPool, LogSource};
use crate::error::Result;
use crate::logs::filter::select_page;
use crate::logs::parse::{decode_all, Decoded};
use crate::logs::stats::summarize;
use crate::models::{ConnectionProfile, FilterCriteria, LogPage, StatsSummary};

/// Reads and normalizes the log entries of a connection profile.
///
/// Every call re-reads the whole source; nothing is cached between calls.
pub struct LogReader {
    source: LogSource,
}

impl LogReader {
    pub fn new(source: LogSource) -> Self {
        Self { source }
    }

    async fn load(&self, pool: &ClientPool, profile: &ConnectionProfile) -> Result<Decoded> {
        let mut conn = pool.get(profile).await?;

        let raw = match self.source.read_raw(&mut conn).await {
            Ok(raw) => raw,
            Err(e) => {
                // A broken client would fail every later request too
                if is_connection_error(&e) {
                    pool.remove(&profile.pool_key());
                }
                return Err(e.into());
            }
        };

        let decoded = decode_all(&raw, profile.id);
        if decoded.skipped > 0 {
            log::warn!(
                "Skipped {} malformed log entries on connection {}",
                decoded.skipped,
                profile.id
            );
        }
        Ok(decoded)
    }

    /// Filtered, newest-first page of records
    pub async fn fetch(
        &self,
        pool: &ClientPool,
        profile: &ConnectionProfile,
        criteria: &FilterCriteria,
    ) -> Result<LogPage> {
        let decoded = self.load(pool, profile).await?;
        Ok(select_page(decoded, criteria))
    }

    /// Summary of the last 24 hours. Failures yield the neutral summary.
    pub async fn stats(&self, pool: &ClientPool, profile: &ConnectionProfile) -> StatsSummary {
        match self.load(pool, profile).await {
            Ok(decoded) => summarize(&decoded.records, Utc::now()),
            Err(e) => {
                log::error!("Failed to compute log stats for connection {}: {}", profile.id, e);
                StatsSummary::default()
            }
        }
    }
}
