use serde::{Deserialize, Serialize};

use crate::limits::LimitName;
use crate::window::Window;

use super::policy::Tier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowUsage {
    pub window: Window,
    pub key: String,
    pub limit_name: LimitName,
    pub limit: u64,
    pub used: u64,
}

impl WindowUsage {
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }
}

/// The first rule a refused charge failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDenial {
    pub window: Window,
    pub limit_name: LimitName,
    pub limit: u64,
    pub used: u64,
    pub requested: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { usage: Vec<WindowUsage> },
    Bypassed { tier: Tier },
    // stored record untouched
    Denied(QuotaDenial),
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, QuotaDecision::Denied(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub device_id: String,
    pub tier: Tier,
    pub metered: bool,
    pub windows: Vec<WindowUsage>,
}
