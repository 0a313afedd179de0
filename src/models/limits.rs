use crate::db::{self, schema::LIMITS_KEY};
use crate::error::AppError;
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Configured daily budget in minutes per domain. A domain absent from the
/// map has no limit. Survives day rollover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Limits {
    pub minutes_by_domain: BTreeMap<String, i64>,
}

impl Limits {
    pub fn load(conn: &Connection) -> Result<Self, AppError> {
        Ok(Self {
            minutes_by_domain: db::get_value(conn, LIMITS_KEY)?.unwrap_or_default(),
        })
    }

    pub fn save(&self, conn: &Connection) -> Result<(), AppError> {
        db::set_value(conn, LIMITS_KEY, &self.minutes_by_domain)
    }

    /// A non-positive number of minutes removes the limit.
    pub fn set(&mut self, domain: &str, minutes: i64) {
        if minutes > 0 {
            self.minutes_by_domain.insert(domain.to_string(), minutes);
        } else {
            self.minutes_by_domain.remove(domain);
        }
    }

    pub fn minutes_for(&self, domain: &str) -> Option<i64> {
        self.minutes_by_domain.get(domain).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_positive_minutes_adds_limit() {
        let mut limits = Limits::default();
        limits.set("youtube.com", 30);
        assert_eq!(limits.minutes_for("youtube.com"), Some(30));
    }

    #[test]
    fn test_set_non_positive_minutes_removes_limit() {
        let mut limits = Limits::default();
        limits.set("youtube.com", 30);

        limits.set("youtube.com", 0);
        assert_eq!(limits.minutes_for("youtube.com"), None);

        limits.set("youtube.com", 15);
        limits.set("youtube.com", -1);
        assert_eq!(limits.minutes_for("youtube.com"), None);
    }
}
