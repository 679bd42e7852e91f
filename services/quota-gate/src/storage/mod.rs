pub mod database;
pub mod error;
pub mod memory;
pub mod record;
pub mod schema;

pub use database::SqliteUsageStore;
pub use error::StoreError;
pub use memory::MemoryUsageStore;
pub use record::DeviceUsageRecord;

pub const USAGE_DB_FILENAME: &str = "usage.db";

/// What a read-modify-write closure wants done with the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Commit(DeviceUsageRecord),
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Committed(DeviceUsageRecord),
    Aborted(DeviceUsageRecord),
}

/// Persisted per-device usage counters.
///
/// `update` must run the read, the closure and the write as one atomic unit
/// per device: two concurrent updates for the same device never observe the
/// same pre-update record.
pub trait UsageStore: Send + Sync {
    fn get(&self, device_id: &str) -> Result<DeviceUsageRecord, StoreError>;

    fn update(
        &self,
        device_id: &str,
        mutate: &mut dyn FnMut(&DeviceUsageRecord) -> Mutation,
    ) -> Result<UpdateOutcome, StoreError>;
}
