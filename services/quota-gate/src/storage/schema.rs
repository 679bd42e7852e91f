use rusqlite::Connection;

use super::error::StoreError;

pub const DEVICE_USAGE_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS device_usage (
    device_id TEXT PRIMARY KEY,
    day_key TEXT NOT NULL DEFAULT '',
    day_used INTEGER NOT NULL DEFAULT 0,
    week_key TEXT NOT NULL DEFAULT '',
    week_used INTEGER NOT NULL DEFAULT 0,
    month_key TEXT NOT NULL DEFAULT '',
    month_used INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
"#;

pub fn init_database(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(DEVICE_USAGE_TABLE_SCHEMA)?;
    Ok(())
}
