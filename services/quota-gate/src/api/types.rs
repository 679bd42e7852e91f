use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gate::{QuotaDenial, Tier, UsageReport, WindowUsage};
use crate::limits::LimitValues;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    #[serde(default)]
    pub device_id: String,
    pub requested_chars: Option<u64>,
    pub text: Option<String>,
    #[serde(default)]
    pub tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Allowed,
    Bypassed,
    Denied,
    // store failed under fail-open
    Unmetered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub decision: DecisionKind,
    pub device_id: String,
    pub tier: Tier,
    pub requested_chars: u64,
    #[serde(default)]
    pub usage: Vec<WindowUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial: Option<QuotaDenial>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageQuery {
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageResponse {
    pub report: UsageReport,
    pub limits: LimitValues,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsResponse {
    pub limits: LimitValues,
    pub fetched_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub details: Option<serde_json::Value>,
}
