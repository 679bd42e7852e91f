use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::limits::LimitName;
use crate::window::Window;

use super::error::QuotaError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    #[serde(alias = "plus")]
    Subscriber,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Subscriber => "subscriber",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitRule {
    pub window: Window,
    pub limit: LimitName,
}

const fn rule(window: Window, limit: LimitName) -> LimitRule {
    LimitRule { window, limit }
}

const DAILY_RULES: &[LimitRule] = &[rule(Window::Day, LimitName::DailyFree)];
const FREE_DUAL_RULES: &[LimitRule] = &[
    rule(Window::Week, LimitName::WeeklyFree),
    rule(Window::Month, LimitName::MonthlyFree),
];
const SUBSCRIBER_DUAL_RULES: &[LimitRule] = &[
    rule(Window::Week, LimitName::WeeklyFree),
    rule(Window::Month, LimitName::MonthlyPlus),
];
const SUBSCRIBER_MONTHLY_RULES: &[LimitRule] = &[rule(Window::Month, LimitName::MonthlyPlus)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metering {
    Bypass,
    Rules(&'static [LimitRule]),
}

/// Which windows and limits apply to each tier.
///
/// | policy | free | subscriber |
/// |---|---|---|
/// | `DailyOnly` | day / `daily_free_chars` | same as free, or bypass when `subscriber_bypass` |
/// | `DualWindowFree` | week / `weekly_free_chars` + month / `monthly_free_chars` | week / `weekly_free_chars` + month / `monthly_plus_chars` |
/// | `MonthlyOnlySubscriber` | week / `weekly_free_chars` + month / `monthly_free_chars` | month / `monthly_plus_chars` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaPolicy {
    DailyOnly { subscriber_bypass: bool },
    DualWindowFree,
    MonthlyOnlySubscriber,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        QuotaPolicy::DailyOnly {
            subscriber_bypass: true,
        }
    }
}

impl QuotaPolicy {
    pub fn metering(&self, tier: Tier) -> Metering {
        match (self, tier) {
            (QuotaPolicy::DailyOnly { subscriber_bypass: true }, Tier::Subscriber) => {
                Metering::Bypass
            }
            (QuotaPolicy::DailyOnly { .. }, _) => Metering::Rules(DAILY_RULES),
            (QuotaPolicy::DualWindowFree, Tier::Free)
            | (QuotaPolicy::MonthlyOnlySubscriber, Tier::Free) => Metering::Rules(FREE_DUAL_RULES),
            (QuotaPolicy::DualWindowFree, Tier::Subscriber) => {
                Metering::Rules(SUBSCRIBER_DUAL_RULES)
            }
            (QuotaPolicy::MonthlyOnlySubscriber, Tier::Subscriber) => {
                Metering::Rules(SUBSCRIBER_MONTHLY_RULES)
            }
        }
    }

    /// Only meaningful for `DailyOnly`; other policies are returned unchanged.
    pub fn with_subscriber_bypass(self, enabled: bool) -> Self {
        match self {
            QuotaPolicy::DailyOnly { .. } => QuotaPolicy::DailyOnly {
                subscriber_bypass: enabled,
            },
            other => other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QuotaPolicy::DailyOnly { .. } => "daily-only",
            QuotaPolicy::DualWindowFree => "dual-window-free",
            QuotaPolicy::MonthlyOnlySubscriber => "monthly-only-subscriber",
        }
    }
}

impl FromStr for QuotaPolicy {
    type Err = QuotaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "daily-only" | "daily" => Ok(QuotaPolicy::default()),
            "dual-window-free" | "dual-window" => Ok(QuotaPolicy::DualWindowFree),
            "monthly-only-subscriber" => Ok(QuotaPolicy::MonthlyOnlySubscriber),
            other => Err(QuotaError::UnknownPolicy(other.to_string())),
        }
    }
}

/// What the request layer does when the usage store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    #[default]
    Closed,
    Open,
}

impl FailureMode {
    pub fn admits_on_outage(&self) -> bool {
        matches!(self, FailureMode::Open)
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureMode::Closed => f.write_str("closed"),
            FailureMode::Open => f.write_str("open"),
        }
    }
}

impl FromStr for FailureMode {
    type Err = QuotaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "closed" | "fail-closed" => Ok(FailureMode::Closed),
            "open" | "fail-open" => Ok(FailureMode::Open),
            other => Err(QuotaError::UnknownFailureMode(other.to_string())),
        }
    }
}
