use crate::db::{self, schema::USAGE_TODAY_KEY};
use crate::error::AppError;
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Seconds accrued per domain for the current day. Mutated only by the
/// accrual step; reset by the day-rollover guard and `clear_today`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageToday {
    pub seconds_by_domain: BTreeMap<String, i64>,
}

impl UsageToday {
    pub fn load(conn: &Connection) -> Result<Self, AppError> {
        Ok(Self {
            seconds_by_domain: db::get_value(conn, USAGE_TODAY_KEY)?.unwrap_or_default(),
        })
    }

    pub fn save(&self, conn: &Connection) -> Result<(), AppError> {
        db::set_value(conn, USAGE_TODAY_KEY, &self.seconds_by_domain)
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(&self.seconds_by_domain)?)
    }

    /// Add accrued seconds to a domain, creating the entry at zero if
    /// absent. Returns the new total.
    pub fn add_seconds(&mut self, domain: &str, secs: i64) -> i64 {
        let total = self.seconds_by_domain.entry(domain.to_string()).or_insert(0);
        *total += secs;
        *total
    }

    pub fn seconds_for(&self, domain: &str) -> i64 {
        self.seconds_by_domain.get(domain).copied().unwrap_or(0)
    }
}
