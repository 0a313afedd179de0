pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

// The whole tracker state lives in five entries of the kv table.
pub const USAGE_DATE_KEY: &str = "usage_date";
pub const USAGE_TODAY_KEY: &str = "usage_today";
pub const LIMITS_KEY: &str = "limits";
pub const NOTIFIED_KEY: &str = "notified_today";
pub const STATE_KEY: &str = "state";
