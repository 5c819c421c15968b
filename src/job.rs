//! One run of the AI Manager.
//!
//! Control flow: load referrals, marketing posts and recent fraud logs
//! concurrently, detect fraud, aggregate marketing figures, optionally ask for
//! insights, then persist the referral updates, the report, the fraud logs and
//! the seller suggestions.
//!
//! Collaborator failures never abort a run. A failed read is treated as an
//! empty list, a failed write skips that one record. There is no transaction
//! across writes and nothing is rolled back.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{info, warn};

use crate::aggregation::analyze_marketing;
use crate::fraud::{DetectorConfig, detect_fraud};
use crate::insight::{InsightProvider, build_prompt, generate_or_empty};
use crate::model::RunSummary;
use crate::report::{FraudSummary, ReportSnapshot, compile_report};
use crate::storage::MarketplaceStore;

/// Default number of fraud log entries loaded as context for insights.
pub const DEFAULT_RECENT_LOG_LIMIT: u32 = 50;

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub detector: DetectorConfig,
    pub recent_log_limit: u32,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            recent_log_limit: DEFAULT_RECENT_LOG_LIMIT,
        }
    }
}

/// Run the job once as of `now`.
pub async fn run_ai_manager(
    store: &dyn MarketplaceStore,
    insight: &dyn InsightProvider,
    now: DateTime<Utc>,
    settings: &JobSettings,
) -> RunSummary {
    let (referrals, posts, recent_logs) = tokio::join!(
        store.list_referrals(),
        store.list_marketing_posts(),
        store.list_recent_referral_logs(settings.recent_log_limit),
    );
    let referrals = referrals.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load referrals, continuing with none");
        Vec::new()
    });
    let posts = posts.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load marketing posts, continuing with none");
        Vec::new()
    });
    let recent_logs = recent_logs.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load recent referral logs, continuing with none");
        Vec::new()
    });

    info!(
        referrals = referrals.len(),
        posts = posts.len(),
        recent_logs = recent_logs.len(),
        "AI Manager run started"
    );

    let scan = detect_fraud(&referrals, now, &settings.detector);
    let marketing = analyze_marketing(&posts);

    let prompt = build_prompt(&marketing, &scan, referrals.len(), recent_logs.len());
    let insights = generate_or_empty(insight, &prompt).await;

    let snapshot = ReportSnapshot::new(
        now,
        marketing,
        FraudSummary::from_scan(&scan, referrals.len()),
    );
    let compiled = compile_report(&snapshot, &insights);

    let updates = scan.updates();
    join_all(updates.iter().map(|(id, update)| async move {
        if let Err(e) = store.update_referral(id, update).await {
            warn!(referral_id = %id, error = %e, "Failed to update flagged referral");
        }
    }))
    .await;

    if let Err(e) = store.insert_report(&compiled.report).await {
        warn!(error = %e, "Failed to save report");
    }

    let log_entries = scan.log_entries();
    join_all(log_entries.iter().map(|entry| async move {
        if let Err(e) = store.insert_referral_log(entry).await {
            warn!(referral_id = %entry.referral_id, error = %e, "Failed to save referral log");
        }
    }))
    .await;

    join_all(compiled.suggestions.iter().map(|suggestion| async move {
        if let Err(e) = store.insert_suggestion(suggestion).await {
            warn!(seller_id = %suggestion.seller_id, error = %e, "Failed to save suggestion");
        }
    }))
    .await;

    info!(
        fraud_detected = scan.flagged_count(),
        low_performing_ads = snapshot.low_performing_ads,
        suggestions = compiled.suggestions.len(),
        insights = !insights.is_empty(),
        "AI Manager run completed"
    );

    RunSummary {
        success: true,
        report: compiled.report.content,
        fraud_detected: scan.flagged_count(),
        low_performing_ads: snapshot.low_performing_ads,
    }
}
