
pub mod api;
pub mod config;
pub mod gate;
pub mod limits;
pub mod storage;
pub mod window;

pub use api::{create_router, ApiState};
pub use config::QuotaGateConfig;
pub use gate::{FailureMode, QuotaDecision, QuotaDenial, QuotaError, QuotaGate, QuotaPolicy, Tier};
pub use limits::{ConfigCache, ConfigSnapshot, LimitValues, LimitsError, LimitsProvider};
pub use storage::{DeviceUsageRecord, StoreError, UsageStore};
pub use window::{Window, WindowKeys};
