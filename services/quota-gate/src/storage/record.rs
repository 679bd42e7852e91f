use serde::{Deserialize, Serialize};

use crate::window::{Window, WindowKeys};

/// Character usage of one device, one counter per calendar window.
///
/// A counter only counts while its key matches the key computed for "now";
/// a stale key means the window rolled over and the counter reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceUsageRecord {
    pub device_id: String,
    pub day_key: String,
    pub day_used: u64,
    pub week_key: String,
    pub week_used: u64,
    pub month_key: String,
    pub month_used: u64,
}

impl DeviceUsageRecord {
    pub fn empty(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            ..Self::default()
        }
    }

    pub fn key(&self, window: Window) -> &str {
        match window {
            Window::Day => &self.day_key,
            Window::Week => &self.week_key,
            Window::Month => &self.month_key,
        }
    }

    pub fn stored_used(&self, window: Window) -> u64 {
        match window {
            Window::Day => self.day_used,
            Window::Week => self.week_used,
            Window::Month => self.month_used,
        }
    }

    pub fn used(&self, window: Window, keys: &WindowKeys) -> u64 {
        if self.key(window) == keys.get(window) {
            self.stored_used(window)
        } else {
            0
        }
    }

    pub fn set(&mut self, window: Window, key: &str, used: u64) {
        let (slot_key, slot_used) = match window {
            Window::Day => (&mut self.day_key, &mut self.day_used),
            Window::Week => (&mut self.week_key, &mut self.week_used),
            Window::Month => (&mut self.month_key, &mut self.month_used),
        };
        *slot_key = key.to_string();
        *slot_used = used;
    }
}
