use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Day,
    Week,
    Month,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Day => "day",
            Window::Week => "week",
            Window::Month => "month",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window identifiers derived from a single instant, always in UTC.
///
/// `day` is `YYYY-MM-DD`, `week` is the `YYYY-MM-DD` of the Monday that opens
/// the week (Sunday closes the previous week), `month` is `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowKeys {
    pub day: String,
    pub week: String,
    pub month: String,
}

impl WindowKeys {
    pub fn at(now: DateTime<Utc>) -> Self {
        let date = now.date_naive();
        Self {
            day: day_key(date),
            week: day_key(week_start(date)),
            month: format!("{:04}-{:02}", date.year(), date.month()),
        }
    }

    pub fn get(&self, window: Window) -> &str {
        match window {
            Window::Day => &self.day,
            Window::Week => &self.week,
            Window::Month => &self.month,
        }
    }
}

fn day_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday();
    date - Duration::days(i64::from(offset))
}
