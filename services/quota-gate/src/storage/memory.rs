use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::error::StoreError;
use super::record::DeviceUsageRecord;
use super::{Mutation, UpdateOutcome, UsageStore};

/// In-process [`UsageStore`]. The map entry for a device stays locked for the
/// whole read-modify-write.
///
/// `set_unavailable(true)` makes every call fail with
/// [`StoreError::Unavailable`], which is how tests simulate an outage.
#[derive(Default)]
pub struct MemoryUsageStore {
    records: DashMap<String, DeviceUsageRecord>,
    unavailable: AtomicBool,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: DeviceUsageRecord) {
        self.records.insert(record.device_id.clone(), record);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

impl UsageStore for MemoryUsageStore {
    fn get(&self, device_id: &str) -> Result<DeviceUsageRecord, StoreError> {
        self.ensure_available()?;
        Ok(self
            .records
            .get(device_id)
            .map(|record| record.clone())
            .unwrap_or_else(|| DeviceUsageRecord::empty(device_id)))
    }

    fn update(
        &self,
        device_id: &str,
        mutate: &mut dyn FnMut(&DeviceUsageRecord) -> Mutation,
    ) -> Result<UpdateOutcome, StoreError> {
        self.ensure_available()?;

        match self.records.entry(device_id.to_string()) {
            Entry::Occupied(mut entry) => match mutate(entry.get()) {
                Mutation::Abort => Ok(UpdateOutcome::Aborted(entry.get().clone())),
                Mutation::Commit(mut next) => {
                    next.device_id = device_id.to_string();
                    entry.insert(next.clone());
                    Ok(UpdateOutcome::Committed(next))
                }
            },
            Entry::Vacant(entry) => {
                let current = DeviceUsageRecord::empty(device_id);
                match mutate(&current) {
                    Mutation::Abort => Ok(UpdateOutcome::Aborted(current)),
                    Mutation::Commit(mut next) => {
                        next.device_id = device_id.to_string();
                        entry.insert(next.clone());
                        Ok(UpdateOutcome::Committed(next))
                    }
                }
            }
        }
    }
}
