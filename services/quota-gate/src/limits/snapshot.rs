use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::error::LimitsError;
use super::{DAILY_FREE_CHARS, MONTHLY_FREE_CHARS, MONTHLY_PLUS_CHARS, WEEKLY_FREE_CHARS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitName {
    DailyFree,
    WeeklyFree,
    MonthlyFree,
    MonthlyPlus,
}

impl LimitName {
    pub const ALL: [LimitName; 4] = [
        LimitName::DailyFree,
        LimitName::WeeklyFree,
        LimitName::MonthlyFree,
        LimitName::MonthlyPlus,
    ];

    pub fn parameter(&self) -> &'static str {
        match self {
            LimitName::DailyFree => DAILY_FREE_CHARS,
            LimitName::WeeklyFree => WEEKLY_FREE_CHARS,
            LimitName::MonthlyFree => MONTHLY_FREE_CHARS,
            LimitName::MonthlyPlus => MONTHLY_PLUS_CHARS,
        }
    }
}

impl fmt::Display for LimitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.parameter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitValues {
    pub daily_free_chars: u64,
    pub weekly_free_chars: u64,
    pub monthly_free_chars: u64,
    pub monthly_plus_chars: u64,
}

impl Default for LimitValues {
    fn default() -> Self {
        Self {
            daily_free_chars: 2_000,
            weekly_free_chars: 2_000,
            monthly_free_chars: 8_000,
            monthly_plus_chars: 500_000,
        }
    }
}

impl LimitValues {
    pub fn get(&self, name: LimitName) -> u64 {
        match name {
            LimitName::DailyFree => self.daily_free_chars,
            LimitName::WeeklyFree => self.weekly_free_chars,
            LimitName::MonthlyFree => self.monthly_free_chars,
            LimitName::MonthlyPlus => self.monthly_plus_chars,
        }
    }

    fn set(&mut self, name: LimitName, value: u64) {
        match name {
            LimitName::DailyFree => self.daily_free_chars = value,
            LimitName::WeeklyFree => self.weekly_free_chars = value,
            LimitName::MonthlyFree => self.monthly_free_chars = value,
            LimitName::MonthlyPlus => self.monthly_plus_chars = value,
        }
    }

    /// Reads limits from a fetched document.
    ///
    /// Accepts a remote-config template
    /// (`{"parameters": {"daily_free_chars": {"defaultValue": {"value": "2000"}}}}`)
    /// or a flat object (`{"daily_free_chars": 2000}`). Parameters absent from
    /// the document keep the value from `fallback`.
    pub fn from_document(document: &JsonValue, fallback: &LimitValues) -> Result<Self, LimitsError> {
        let object = document
            .as_object()
            .ok_or_else(|| LimitsError::InvalidDocument("expected a JSON object".into()))?;

        let mut limits = *fallback;
        match object.get("parameters") {
            Some(JsonValue::Object(parameters)) => {
                for name in LimitName::ALL {
                    let raw = parameters
                        .get(name.parameter())
                        .and_then(|param| param.get("defaultValue"))
                        .and_then(|default| default.get("value"));
                    if let Some(raw) = raw {
                        limits.set(name, parse_limit(name, raw)?);
                    }
                }
            }
            Some(_) => {
                return Err(LimitsError::InvalidDocument(
                    "`parameters` must be an object".into(),
                ))
            }
            None => {
                for name in LimitName::ALL {
                    if let Some(raw) = object.get(name.parameter()) {
                        limits.set(name, parse_limit(name, raw)?);
                    }
                }
            }
        }

        Ok(limits)
    }
}

fn parse_limit(name: LimitName, raw: &JsonValue) -> Result<u64, LimitsError> {
    let parsed = match raw {
        JsonValue::Number(number) => number.as_u64(),
        JsonValue::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| LimitsError::InvalidValue {
        name: name.parameter().to_string(),
        value: raw.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub limits: LimitValues,
    /// `None` while the seeded defaults are still in effect.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ConfigSnapshot {
    pub fn defaults(limits: LimitValues) -> Self {
        Self {
            limits,
            fetched_at: None,
        }
    }

    pub fn fetched(limits: LimitValues, fetched_at: DateTime<Utc>) -> Self {
        Self {
            limits,
            fetched_at: Some(fetched_at),
        }
    }

    pub fn limit(&self, name: LimitName) -> u64 {
        self.limits.get(name)
    }
}
