use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("device id must not be empty")]
    InvalidDeviceId,
    #[error("unknown quota policy: {0}")]
    UnknownPolicy(String),
    #[error("unknown store failure mode: {0}")]
    UnknownFailureMode(String),
    #[error("usage update for device {device_id} was aborted without a quota decision")]
    UpdateAborted { device_id: String },
    #[error("storage error: {0}")]
    StorageError(#[from] StoreError),
}

impl QuotaError {
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            QuotaError::StorageError(_) | QuotaError::UpdateAborted { .. }
        )
    }
}
