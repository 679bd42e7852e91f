use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::error::StoreError;
use super::record::DeviceUsageRecord;
use super::schema::init_database;
use super::{Mutation, UpdateOutcome, UsageStore, USAGE_DB_FILENAME};

/// Updates run inside an `IMMEDIATE` transaction so the write lock is held
/// across read-check-write, also between processes sharing the file.
pub struct SqliteUsageStore {
    conn: Mutex<Connection>,
}

impl SqliteUsageStore {
    pub fn new(data_dir: PathBuf, busy_timeout: Duration) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.join(USAGE_DB_FILENAME);
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(busy_timeout)?;
        init_database(&conn)?;

        debug!(path = %db_path.display(), "opened usage database");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl UsageStore for SqliteUsageStore {
    fn get(&self, device_id: &str) -> Result<DeviceUsageRecord, StoreError> {
        let conn = self.lock()?;
        load_record(&conn, device_id)
    }

    fn update(
        &self,
        device_id: &str,
        mutate: &mut dyn FnMut(&DeviceUsageRecord) -> Mutation,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = load_record(&tx, device_id)?;

        match mutate(&current) {
            Mutation::Abort => {
                tx.rollback()?;
                Ok(UpdateOutcome::Aborted(current))
            }
            Mutation::Commit(mut next) => {
                next.device_id = device_id.to_string();
                save_record(&tx, &next)?;
                tx.commit()?;
                Ok(UpdateOutcome::Committed(next))
            }
        }
    }
}

fn load_record(conn: &Connection, device_id: &str) -> Result<DeviceUsageRecord, StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT day_key, day_used, week_key, week_used, month_key, month_used
        FROM device_usage
        WHERE device_id = ?1
        "#,
    )?;

    let row = stmt
        .query_row(params![device_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })
        .optional()?;

    let Some((day_key, day_used, week_key, week_used, month_key, month_used)) = row else {
        return Ok(DeviceUsageRecord::empty(device_id));
    };

    Ok(DeviceUsageRecord {
        device_id: device_id.to_string(),
        day_key,
        day_used: to_counter(device_id, "day_used", day_used)?,
        week_key,
        week_used: to_counter(device_id, "week_used", week_used)?,
        month_key,
        month_used: to_counter(device_id, "month_used", month_used)?,
    })
}

fn save_record(conn: &Connection, record: &DeviceUsageRecord) -> Result<(), StoreError> {
    let now = Utc::now().to_rfc3339();

    conn.execute(
        r#"
        INSERT INTO device_usage (device_id, day_key, day_used, week_key, week_used, month_key, month_used, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(device_id) DO UPDATE SET
            day_key = excluded.day_key,
            day_used = excluded.day_used,
            week_key = excluded.week_key,
            week_used = excluded.week_used,
            month_key = excluded.month_key,
            month_used = excluded.month_used,
            updated_at = excluded.updated_at
        "#,
        params![
            record.device_id,
            record.day_key,
            from_counter(&record.device_id, record.day_used)?,
            record.week_key,
            from_counter(&record.device_id, record.week_used)?,
            record.month_key,
            from_counter(&record.device_id, record.month_used)?,
            now
        ],
    )?;

    Ok(())
}

fn to_counter(device_id: &str, column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::CorruptRecord {
        device_id: device_id.to_string(),
        reason: format!("{column} is negative ({value})"),
    })
}

fn from_counter(device_id: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::CorruptRecord {
        device_id: device_id.to_string(),
        reason: format!("counter {value} does not fit in the database"),
    })
}
