//! Referral fraud detection.
//!
//! Two independent heuristics run over the full referral set of one job run:
//!
//! 1. **Mass signup**: a referrer with more than `burst_threshold` referrals
//!    inside the trailing window has every referral past the first
//!    `burst_threshold` marked `suspected`. Small bursts are tolerated; only
//!    the overflow is penalized.
//! 2. **Self-referral**: a referral whose referrer is also the referred user
//!    is marked `invalid`.
//!
//! Detection is a pure function of the referrals and the reference time. The
//! job applies the resulting [`ReferralUpdate`]s and [`NewReferralLog`]s.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{NewReferralLog, Referral, ReferralStatus, ReferralUpdate};

/// Referrals per referrer tolerated inside one window.
pub const DEFAULT_BURST_THRESHOLD: usize = 5;

/// Length of the trailing burst window in hours.
pub const DEFAULT_BURST_WINDOW_HOURS: i64 = 24;

/// Value of `detected_by` on every log entry written by this job.
pub const DETECTED_BY: &str = "AI Manager";

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub burst_threshold: usize,
    pub burst_window: Duration,
    /// Re-log referrals that already carry the rule's verdict.
    ///
    /// Off by default so repeated runs do not grow the audit trail.
    pub relog_flagged: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            burst_threshold: DEFAULT_BURST_THRESHOLD,
            burst_window: Duration::hours(DEFAULT_BURST_WINDOW_HOURS),
            relog_flagged: false,
        }
    }
}

/// Which heuristic produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudRule {
    MassSignup,
    SelfReferral,
}

/// A single rule hit on a single referral.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub referral_id: String,
    pub referral_code: String,
    pub rule: FraudRule,
    pub status: ReferralStatus,
    pub reason: String,
}

impl Detection {
    pub fn update(&self) -> ReferralUpdate {
        ReferralUpdate {
            is_valid: false,
            status: self.status,
        }
    }

    pub fn log_entry(&self) -> NewReferralLog {
        NewReferralLog {
            referral_id: self.referral_id.clone(),
            referral_code: self.referral_code.clone(),
            status: self.status.into(),
            reason: self.reason.clone(),
            detected_by: DETECTED_BY.to_string(),
        }
    }
}

/// Outcome of scanning one batch of referrals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FraudScan {
    /// Detections in the order they were found: bursts first, then self-referrals.
    pub detections: Vec<Detection>,
}

impl FraudScan {
    pub fn flagged_count(&self) -> usize {
        self.detections.len()
    }

    /// Detections that assigned `status`.
    pub fn count_with_status(&self, status: ReferralStatus) -> usize {
        self.detections.iter().filter(|d| d.status == status).count()
    }

    pub fn flagged_codes(&self) -> Vec<String> {
        self.detections
            .iter()
            .map(|d| d.referral_code.clone())
            .collect()
    }

    pub fn log_entries(&self) -> Vec<NewReferralLog> {
        self.detections.iter().map(Detection::log_entry).collect()
    }

    /// Final state of every touched referral.
    ///
    /// A referral hit by both rules appears once, with the later verdict.
    pub fn updates(&self) -> Vec<(String, ReferralUpdate)> {
        let mut order: Vec<&str> = Vec::new();
        let mut latest: HashMap<&str, ReferralUpdate> = HashMap::new();
        for detection in &self.detections {
            if latest
                .insert(detection.referral_id.as_str(), detection.update())
                .is_none()
            {
                order.push(detection.referral_id.as_str());
            }
        }
        order
            .into_iter()
            .filter_map(|id| latest.get(id).map(|u| (id.to_string(), *u)))
            .collect()
    }
}

/// Scan `referrals` for mass signups and self-referrals as of `now`.
pub fn detect_fraud(
    referrals: &[Referral],
    now: DateTime<Utc>,
    config: &DetectorConfig,
) -> FraudScan {
    // Working status per referral so the second rule sees the first rule's verdict
    let mut current: HashMap<&str, ReferralStatus> = referrals
        .iter()
        .map(|r| (r.id.as_str(), r.status))
        .collect();

    let mut detections = Vec::new();
    // A window reaching past the representable range covers every referral
    let window_start = now
        .checked_sub_signed(config.burst_window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut by_referrer: BTreeMap<&str, Vec<&Referral>> = BTreeMap::new();
    for referral in referrals {
        by_referrer
            .entry(referral.referrer_id.as_str())
            .or_default()
            .push(referral);
    }

    for group in by_referrer.values() {
        let mut recent: Vec<&Referral> = group
            .iter()
            .copied()
            .filter(|r| r.created_at > window_start)
            .collect();

        if recent.len() <= config.burst_threshold {
            continue;
        }

        // Stable: equal timestamps keep their input order
        recent.sort_by_key(|r| r.created_at);
        let count = recent.len();
        let hours = config.burst_window.num_hours();

        for referral in recent.into_iter().skip(config.burst_threshold) {
            let status = current
                .get(referral.id.as_str())
                .copied()
                .unwrap_or(referral.status);
            if !config.relog_flagged && status.is_flagged() {
                continue;
            }

            current.insert(referral.id.as_str(), ReferralStatus::Suspected);
            detections.push(Detection {
                referral_id: referral.id.clone(),
                referral_code: referral.referral_code.clone(),
                rule: FraudRule::MassSignup,
                status: ReferralStatus::Suspected,
                reason: format!("Mass signup detected: {count} referrals in {hours} hours"),
            });
        }
    }

    for referral in referrals.iter().filter(|r| r.is_self_referral()) {
        let status = current
            .get(referral.id.as_str())
            .copied()
            .unwrap_or(referral.status);
        if !config.relog_flagged && status == ReferralStatus::Invalid {
            continue;
        }

        current.insert(referral.id.as_str(), ReferralStatus::Invalid);
        detections.push(Detection {
            referral_id: referral.id.clone(),
            referral_code: referral.referral_code.clone(),
            rule: FraudRule::SelfReferral,
            status: ReferralStatus::Invalid,
            reason: "Self-referral detected".to_string(),
        });
    }

    FraudScan { detections }
}
