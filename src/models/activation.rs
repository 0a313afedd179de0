use crate::db::{self, schema::STATE_KEY};
use crate::error::AppError;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// The single "current period" record: which domain is being tracked and
/// since when. `active`, `domain` and `period_start_ms` are always set or
/// cleared together; the constructors are the only way to build one, so the
/// invariant holds by construction. Replaced whole on every transition,
/// never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationState {
    pub active: bool,
    pub domain: Option<String>,
    pub period_start_ms: Option<i64>,
}

impl ActivationState {
    pub fn tracking(domain: &str, now_ms: i64) -> Self {
        Self {
            active: true,
            domain: Some(domain.to_string()),
            period_start_ms: Some(now_ms),
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self) -> bool {
        self.active && self.domain.is_some() && self.period_start_ms.is_some()
    }

    pub fn load(conn: &Connection) -> Result<Self, AppError> {
        Ok(db::get_value(conn, STATE_KEY)?.unwrap_or_default())
    }

    pub fn save(&self, conn: &Connection) -> Result<(), AppError> {
        db::set_value(conn, STATE_KEY, self)
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{migrations, Database};
    use tempfile::tempdir;

    #[test]
    fn test_idle_state_has_no_domain_or_start() {
        let state = ActivationState::idle();
        assert!(!state.active);
        assert!(state.domain.is_none());
        assert!(state.period_start_ms.is_none());
        assert!(!state.is_tracking());
    }

    #[test]
    fn test_tracking_state_is_fully_populated() {
        let state = ActivationState::tracking("example.com", 1_700_000_000_000);
        assert!(state.active);
        assert_eq!(state.domain.as_deref(), Some("example.com"));
        assert_eq!(state.period_start_ms, Some(1_700_000_000_000));
        assert!(state.is_tracking());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        migrations::run(db.connection()).unwrap();
        let conn = db.connection();

        // Nothing stored yet: loads as idle
        let initial = ActivationState::load(conn).unwrap();
        assert!(!initial.is_tracking());

        let state = ActivationState::tracking("example.com", 42);
        state.save(conn).unwrap();

        let loaded = ActivationState::load(conn).unwrap();
        assert_eq!(loaded, state);
    }
}
