use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::limits::{ConfigCache, ConfigSnapshot};
use crate::storage::{DeviceUsageRecord, Mutation, UpdateOutcome, UsageStore};
use crate::window::WindowKeys;

use super::decision::{QuotaDecision, QuotaDenial, UsageReport, WindowUsage};
use super::error::QuotaError;
use super::policy::{LimitRule, Metering, QuotaPolicy, Tier};

#[derive(Clone)]
pub struct QuotaGate {
    cache: Arc<ConfigCache>,
    store: Arc<dyn UsageStore>,
    policy: QuotaPolicy,
}

impl QuotaGate {
    pub fn new(cache: Arc<ConfigCache>, store: Arc<dyn UsageStore>, policy: QuotaPolicy) -> Self {
        Self {
            cache,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> QuotaPolicy {
        self.policy
    }

    pub fn cache(&self) -> &Arc<ConfigCache> {
        &self.cache
    }

    /// Checks `requested_chars` against every limit the policy applies to
    /// `tier` and, if all pass, charges them in a single store update.
    ///
    /// A `Denied` decision leaves the stored record unchanged. Store failures
    /// are returned as errors and are never turned into a decision here.
    pub fn check_and_charge(
        &self,
        device_id: &str,
        requested_chars: u64,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, QuotaError> {
        if device_id.trim().is_empty() {
            return Err(QuotaError::InvalidDeviceId);
        }

        let rules = match self.policy.metering(tier) {
            Metering::Bypass => {
                info!(
                    device_id,
                    %tier,
                    policy = self.policy.name(),
                    requested_chars,
                    "metering bypassed"
                );
                return Ok(QuotaDecision::Bypassed { tier });
            }
            Metering::Rules(rules) => rules,
        };

        if requested_chars == 0 {
            return Ok(QuotaDecision::Allowed { usage: Vec::new() });
        }

        let snapshot = self.cache.get();
        let keys = WindowKeys::at(now);

        let mut denial = None;
        let outcome = self.store.update(device_id, &mut |current: &DeviceUsageRecord| {
            denial = first_exceeded(current, rules, &keys, &snapshot, requested_chars);
            if denial.is_some() {
                return Mutation::Abort;
            }
            Mutation::Commit(charge(current, rules, &keys, requested_chars))
        })?;

        match (outcome, denial) {
            (UpdateOutcome::Aborted(_), Some(denial)) => {
                debug!(
                    device_id,
                    %tier,
                    window = %denial.window,
                    limit = denial.limit,
                    used = denial.used,
                    requested = denial.requested,
                    "quota exceeded"
                );
                Ok(QuotaDecision::Denied(denial))
            }
            (UpdateOutcome::Committed(record), None) => {
                debug!(device_id, %tier, requested_chars, "quota charged");
                Ok(QuotaDecision::Allowed {
                    usage: summarize(&record, rules, &keys, &snapshot),
                })
            }
            _ => Err(QuotaError::UpdateAborted {
                device_id: device_id.to_string(),
            }),
        }
    }

    pub fn usage(
        &self,
        device_id: &str,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> Result<UsageReport, QuotaError> {
        if device_id.trim().is_empty() {
            return Err(QuotaError::InvalidDeviceId);
        }

        let (metered, windows) = match self.policy.metering(tier) {
            Metering::Bypass => (false, Vec::new()),
            Metering::Rules(rules) => {
                let record = self.store.get(device_id)?;
                let snapshot = self.cache.get();
                let keys = WindowKeys::at(now);
                (true, summarize(&record, rules, &keys, &snapshot))
            }
        };

        Ok(UsageReport {
            device_id: device_id.to_string(),
            tier,
            metered,
            windows,
        })
    }
}

fn first_exceeded(
    record: &DeviceUsageRecord,
    rules: &[LimitRule],
    keys: &WindowKeys,
    snapshot: &ConfigSnapshot,
    requested: u64,
) -> Option<QuotaDenial> {
    rules.iter().find_map(|rule| {
        let used = record.used(rule.window, keys);
        let limit = snapshot.limit(rule.limit);
        (used.saturating_add(requested) > limit).then(|| QuotaDenial {
            window: rule.window,
            limit_name: rule.limit,
            limit,
            used,
            requested,
        })
    })
}

// windows outside `rules` keep their key and counter
fn charge(
    record: &DeviceUsageRecord,
    rules: &[LimitRule],
    keys: &WindowKeys,
    requested: u64,
) -> DeviceUsageRecord {
    let mut next = record.clone();
    for rule in rules {
        let used = record.used(rule.window, keys).saturating_add(requested);
        next.set(rule.window, keys.get(rule.window), used);
    }
    next
}

fn summarize(
    record: &DeviceUsageRecord,
    rules: &[LimitRule],
    keys: &WindowKeys,
    snapshot: &ConfigSnapshot,
) -> Vec<WindowUsage> {
    rules
        .iter()
        .map(|rule| WindowUsage {
            window: rule.window,
            key: keys.get(rule.window).to_string(),
            limit_name: rule.limit,
            limit: snapshot.limit(rule.limit),
            used: record.used(rule.window, keys),
        })
        .collect()
}
