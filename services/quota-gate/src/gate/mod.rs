pub mod decision;
pub mod error;
pub mod manager;
pub mod policy;

pub use decision::{QuotaDecision, QuotaDenial, UsageReport, WindowUsage};
pub use error::QuotaError;
pub use manager::QuotaGate;
pub use policy::{FailureMode, LimitRule, Metering, QuotaPolicy, Tier};
