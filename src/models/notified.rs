use crate::db::{self, schema::NOTIFIED_KEY};
use crate::error::AppError;
use rusqlite::Connection;
use std::collections::BTreeSet;

/// Domains whose limit notification already fired today. Reset on day
/// rollover so each domain can notify again tomorrow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifiedToday {
    pub domains: BTreeSet<String>,
}

impl NotifiedToday {
    pub fn load(conn: &Connection) -> Result<Self, AppError> {
        Ok(Self {
            domains: db::get_value(conn, NOTIFIED_KEY)?.unwrap_or_default(),
        })
    }

    pub fn save(&self, conn: &Connection) -> Result<(), AppError> {
        db::set_value(conn, NOTIFIED_KEY, &self.domains)
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(&self.domains)?)
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn mark(&mut self, domain: &str) {
        self.domains.insert(domain.to_string());
    }
}
