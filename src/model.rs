//! Data models for the AI Manager job.
//!
//! The records here mirror the marketplace tables the job reads and writes:
//!
//! - [`Referral`] and [`MarketingPost`] are inputs. Only the referral
//!   validity columns are ever written back.
//! - [`ReferralLog`], [`Report`] and [`Suggestion`] are created by the job and
//!   never modified afterwards.
//!
//! The `New*` variants are the insert payloads: the store assigns `id` and
//! `created_at`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a referral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    /// Redeemed, waiting for the referred user to become active.
    Pending,
    /// Counted towards the referrer's rewards.
    Active,
    /// Part of a mass-signup burst. Still reviewable by an admin.
    Suspected,
    /// Terminal: the referral can never pay out (e.g. self-referral).
    Invalid,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Active => "active",
            ReferralStatus::Suspected => "suspected",
            ReferralStatus::Invalid => "invalid",
        }
    }

    /// Whether a fraud rule has already classified this referral.
    pub fn is_flagged(&self) -> bool {
        matches!(self, ReferralStatus::Suspected | ReferralStatus::Invalid)
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReferralStatus::Pending),
            "active" => Ok(ReferralStatus::Active),
            "suspected" => Ok(ReferralStatus::Suspected),
            "invalid" => Ok(ReferralStatus::Invalid),
            other => Err(anyhow::anyhow!("unknown referral status '{other}'")),
        }
    }
}

/// A record linking a referring user to a newly referred user via a code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    pub id: String,
    pub referrer_id: String,
    pub referred_user_id: String,
    pub referral_code: String,
    pub is_valid: bool,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
}

impl Referral {
    pub fn is_self_referral(&self) -> bool {
        self.referrer_id == self.referred_user_id
    }
}

/// The only columns of a referral the job may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferralUpdate {
    pub is_valid: bool,
    pub status: ReferralStatus,
}

/// A seller's promoted listing with its delivery counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingPost {
    pub id: String,
    /// Missing for legacy posts created before shops existed.
    pub seller_id: Option<String>,
    pub title: String,
    pub impressions: i64,
    pub clicks: i64,
    pub is_active: bool,
    /// Moderation state: "active", "pending", "rejected", ...
    pub status: String,
}

impl MarketingPost {
    /// Clicks per impression as a percentage, 0 when the post was never shown.
    pub fn engagement(&self) -> f64 {
        if self.impressions > 0 {
            self.clicks as f64 / self.impressions as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Verdict recorded in the fraud audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Suspected,
    Invalid,
    Valid,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Suspected => "suspected",
            LogStatus::Invalid => "invalid",
            LogStatus::Valid => "valid",
        }
    }
}

impl FromStr for LogStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suspected" => Ok(LogStatus::Suspected),
            "invalid" => Ok(LogStatus::Invalid),
            "valid" => Ok(LogStatus::Valid),
            other => Err(anyhow::anyhow!("unknown referral log status '{other}'")),
        }
    }
}

impl From<ReferralStatus> for LogStatus {
    fn from(status: ReferralStatus) -> Self {
        match status {
            ReferralStatus::Suspected => LogStatus::Suspected,
            ReferralStatus::Invalid => LogStatus::Invalid,
            ReferralStatus::Pending | ReferralStatus::Active => LogStatus::Valid,
        }
    }
}

/// One entry of the append-only fraud audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralLog {
    pub id: String,
    pub referral_id: String,
    pub referral_code: String,
    pub status: LogStatus,
    pub reason: String,
    pub detected_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReferralLog {
    pub referral_id: String,
    pub referral_code: String,
    pub status: LogStatus,
    pub reason: String,
    pub detected_by: String,
}

/// The persisted artifact of one job run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub report_type: String,
    pub title: String,
    /// Human-readable rendering.
    pub content: String,
    /// Structured snapshot of the same figures as `content`.
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReport {
    pub report_type: String,
    pub title: String,
    pub content: String,
    pub data: serde_json::Value,
}

/// An actionable note addressed to one seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub seller_id: String,
    pub suggestion_type: String,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSuggestion {
    pub seller_id: String,
    pub suggestion_type: String,
    pub title: String,
    pub message: String,
}

/// Request body for POST /ai-manager.
///
/// `action` must be present; its value is not interpreted yet.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub action: String,
}

/// Response body for a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub success: bool,
    pub report: String,
    pub fraud_detected: usize,
    pub low_performing_ads: usize,
}

/// Query parameters for the `/recent` listing endpoints.
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(impressions: i64, clicks: i64) -> MarketingPost {
        MarketingPost {
            id: "p1".to_string(),
            seller_id: None,
            title: "Handwoven basket".to_string(),
            impressions,
            clicks,
            is_active: true,
            status: "active".to_string(),
        }
    }

    #[test]
    fn test_engagement_percentage() {
        assert!((post(200, 3).engagement() - 1.5).abs() < 1e-9);
        assert_eq!(post(50, 25).engagement(), 50.0);
    }

    #[test]
    fn test_engagement_without_impressions() {
        assert_eq!(post(0, 0).engagement(), 0.0);
        // Clicks recorded before impressions were tracked
        assert_eq!(post(0, 4).engagement(), 0.0);
    }

    #[test]
    fn test_referral_status_round_trip_names() {
        for status in [
            ReferralStatus::Pending,
            ReferralStatus::Active,
            ReferralStatus::Suspected,
            ReferralStatus::Invalid,
        ] {
            assert_eq!(status.as_str().parse::<ReferralStatus>().unwrap(), status);
        }
        assert!("banned".parse::<ReferralStatus>().is_err());
    }

    #[test]
    fn test_flagged_statuses() {
        assert!(!ReferralStatus::Pending.is_flagged());
        assert!(!ReferralStatus::Active.is_flagged());
        assert!(ReferralStatus::Suspected.is_flagged());
        assert!(ReferralStatus::Invalid.is_flagged());
    }

    #[test]
    fn test_run_summary_uses_camel_case() {
        let summary = RunSummary {
            success: true,
            report: "r".to_string(),
            fraud_detected: 2,
            low_performing_ads: 1,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["fraudDetected"], 2);
        assert_eq!(json["lowPerformingAds"], 1);
        assert_eq!(json["success"], true);
    }

    #[test]
    fn test_run_request_requires_action() {
        assert!(serde_json::from_str::<RunRequest>(r#"{"action":"run"}"#).is_ok());
        assert!(serde_json::from_str::<RunRequest>("{}").is_err());
    }
}
