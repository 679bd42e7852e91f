use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("usage store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt usage record for device {device_id}: {reason}")]
    CorruptRecord { device_id: String, reason: String },
    #[error("connection poisoned")]
    Poisoned,
}
