use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::logs::parse::{parse_timestamp, Decoded};
use crate::models::{FilterCriteria, LogPage, LogQuery, LogRecord, MAX_PAGE_SIZE};

/// Treats empty strings and the dashboard's `all` sentinel as "not set".
fn provided(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

fn parse_bound(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    // A bare date on the upper bound covers the whole day
    if end_of_day {
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return date
                .and_hms_nano_opt(23, 59, 59, 999_999_999)
                .map(|naive| naive.and_utc());
        }
    }
    parse_timestamp(raw)
}

fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn parse_number(raw: &str, field: &str, min: usize, max: usize, errors: &mut Vec<String>) -> Option<usize> {
    match raw.parse::<usize>() {
        Ok(n) if (min..=max).contains(&n) => Some(n),
        _ if max == usize::MAX => {
            errors.push(format!("{}: must be an integer >= {}", field, min));
            None
        }
        _ => {
            errors.push(format!("{}: must be an integer between {} and {}", field, min, max));
            None
        }
    }
}

impl FilterCriteria {
    /// Validate the raw query string, collecting every problem found.
    pub fn from_query(query: &LogQuery) -> Result<FilterCriteria, Vec<String>> {
        let mut errors = Vec::new();
        let mut criteria = FilterCriteria::default();

        if let Some(level) = provided(&query.level) {
            match level.parse() {
                Ok(level) => criteria.level = Some(level),
                Err(e) => errors.push(format!("level: {}", e)),
            }
        }

        criteria.service = provided(&query.service).map(str::to_string);
        criteria.search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        if let Some(raw) = provided(&query.start_date) {
            criteria.start = parse_bound(raw, false);
            if criteria.start.is_none() {
                errors.push(format!("startDate: invalid date {:?}", raw));
            }
        }
        if let Some(raw) = provided(&query.end_date) {
            criteria.end = parse_bound(raw, true);
            if criteria.end.is_none() {
                errors.push(format!("endDate: invalid date {:?}", raw));
            }
        }
        if let (Some(start), Some(end)) = (criteria.start, criteria.end) {
            if start > end {
                errors.push("startDate: must not be after endDate".to_string());
            }
        }

        if let Some(raw) = provided(&query.start_time) {
            criteria.start_time = parse_time_of_day(raw);
            if criteria.start_time.is_none() {
                errors.push(format!("startTime: expected HH:MM or HH:MM:SS, got {:?}", raw));
            }
        }
        if let Some(raw) = provided(&query.end_time) {
            criteria.end_time = parse_time_of_day(raw);
            if criteria.end_time.is_none() {
                errors.push(format!("endTime: expected HH:MM or HH:MM:SS, got {:?}", raw));
            }
        }

        if let Some(raw) = provided(&query.page) {
            if let Some(page) = parse_number(raw, "page", 1, usize::MAX, &mut errors) {
                criteria.page = page;
            }
        }
        if let Some(raw) = provided(&query.limit) {
            if let Some(limit) = parse_number(raw, "limit", 1, MAX_PAGE_SIZE, &mut errors) {
                criteria.limit = limit;
            }
        }

        if errors.is_empty() {
            Ok(criteria)
        } else {
            Err(errors)
        }
    }

    /// Whether `record` satisfies every criterion that is set.
    pub fn matches(&self, record: &LogRecord) -> bool {
        if let Some(level) = self.level {
            if record.level != level {
                return false;
            }
        }

        if let Some(ref service) = self.service {
            if &record.service != service {
                return false;
            }
        }

        if let Some(ref needle) = self.search {
            let hit = record.message.to_lowercase().contains(needle)
                || record.service.to_lowercase().contains(needle)
                || record.id.to_lowercase().contains(needle)
                || record
                    .event_id
                    .as_deref()
                    .is_some_and(|id| id.to_lowercase().contains(needle));
            if !hit {
                return false;
            }
        }

        if self.start.is_some_and(|start| record.timestamp < start) {
            return false;
        }
        if self.end.is_some_and(|end| record.timestamp > end) {
            return false;
        }

        let time = record.timestamp.time();
        match (self.start_time, self.end_time) {
            (Some(from), Some(to)) if from <= to => from <= time && time <= to,
            // Window wraps past midnight, e.g. 22:00 to 02:00
            (Some(from), Some(to)) => time >= from || time <= to,
            (Some(from), None) => time >= from,
            (None, Some(to)) => time <= to,
            (None, None) => true,
        }
    }

    fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// Filter, order newest first and cut out the requested page.
pub fn select_page(decoded: Decoded, criteria: &FilterCriteria) -> LogPage {
    let mut matching: Vec<LogRecord> = decoded
        .records
        .into_iter()
        .filter(|record| criteria.matches(record))
        .collect();

    // Stable sort keeps source order among equal timestamps
    matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let total = matching.len();
    let logs = matching
        .into_iter()
        .skip(criteria.offset())
        .take(criteria.limit)
        .collect();

    LogPage {
        logs,
        total,
        skipped: decoded.skipped,
    }
}
