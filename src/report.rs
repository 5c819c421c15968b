//! Report compilation.
//!
//! A [`ReportSnapshot`] holds every figure that ends up in a report. Both the
//! rendered `content` and the structured `data` column are produced from the
//! same snapshot, so the two representations cannot disagree.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregation::{MarketingSummary, PostPerformance};
use crate::fraud::FraudScan;
use crate::model::{NewReport, NewSuggestion, ReferralStatus};

pub const REPORT_TYPE: &str = "weekly_summary";

pub const SUGGESTION_TYPE: &str = "marketing";

pub const SUGGESTION_TITLE: &str = "Low Performing Ad";

/// Suggestions written per run at most.
pub const MAX_SUGGESTIONS: usize = 5;

/// Fraud figures as they appear in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudSummary {
    /// Referrals marked `suspected` by this run (mass signups).
    pub suspected_count: usize,
    /// Referrals marked `invalid` by this run (self-referrals).
    pub invalid_count: usize,
    pub flagged_codes: Vec<String>,
    pub total_referrals: usize,
}

impl FraudSummary {
    pub fn from_scan(scan: &FraudScan, total_referrals: usize) -> Self {
        Self {
            suspected_count: scan.count_with_status(ReferralStatus::Suspected),
            invalid_count: scan.count_with_status(ReferralStatus::Invalid),
            flagged_codes: scan.flagged_codes(),
            total_referrals,
        }
    }
}

/// Everything one report says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub generated_at: DateTime<Utc>,
    pub marketing: MarketingSummary,
    pub fraud: FraudSummary,
    pub low_performing_ads: usize,
}

impl ReportSnapshot {
    pub fn new(
        generated_at: DateTime<Utc>,
        marketing: MarketingSummary,
        fraud: FraudSummary,
    ) -> Self {
        let low_performing_ads = marketing.low_performers.len();
        Self {
            generated_at,
            marketing,
            fraud,
            low_performing_ads,
        }
    }

    /// e.g. "Weekly Summary - 2025-06-01"
    pub fn title(&self) -> String {
        format!("Weekly Summary - {}", self.generated_at.format("%Y-%m-%d"))
    }

    /// Structured form stored alongside the rendered text.
    pub fn data(&self) -> serde_json::Value {
        let m = &self.marketing;
        serde_json::json!({
            "generated_at": self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            "marketing": {
                "total_posts": m.total_posts,
                "active_posts": m.active_posts,
                "pending_posts": m.pending_posts,
                "total_impressions": m.total_impressions,
                "total_clicks": m.total_clicks,
                "avg_engagement": m.avg_engagement,
                "top_performers": m.top_performers,
            },
            "fraud": self.fraud,
            "low_performing_ads": self.low_performing_ads,
        })
    }

    /// Render the report body. The insights block is omitted when `insights` is blank.
    pub fn render(&self, insights: &str) -> String {
        let m = &self.marketing;
        let flagged = if self.fraud.flagged_codes.is_empty() {
            "None".to_string()
        } else {
            self.fraud.flagged_codes.join(", ")
        };

        let mut out = format!(
            "AI MANAGER WEEKLY REPORT\n\
             Generated: {}\n\
             \n\
             MARKETING PERFORMANCE\n\
             - Total Posts: {}\n\
             - Active Posts: {}\n\
             - Pending Posts: {}\n\
             - Total Impressions: {}\n\
             - Total Clicks: {}\n\
             - Average Engagement: {}%\n\
             \n\
             FRAUD DETECTION\n\
             - Suspected Referrals: {}\n\
             - Invalid Referrals: {}\n\
             - Flagged Codes: {}\n\
             \n\
             LOW PERFORMING ADS: {}\n",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            m.total_posts,
            m.active_posts,
            m.pending_posts,
            m.total_impressions,
            m.total_clicks,
            m.avg_engagement,
            self.fraud.suspected_count,
            self.fraud.invalid_count,
            flagged,
            self.low_performing_ads,
        );

        let insights = insights.trim();
        if !insights.is_empty() {
            out.push_str("\nAI INSIGHTS\n");
            out.push_str(insights);
            out.push('\n');
        }

        out
    }
}

/// The records a run persists besides the fraud logs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledReport {
    pub report: NewReport,
    pub suggestions: Vec<NewSuggestion>,
}

pub fn compile_report(snapshot: &ReportSnapshot, insights: &str) -> CompiledReport {
    CompiledReport {
        report: NewReport {
            report_type: REPORT_TYPE.to_string(),
            title: snapshot.title(),
            content: snapshot.render(insights),
            data: snapshot.data(),
        },
        suggestions: build_suggestions(&snapshot.marketing.low_performers),
    }
}

/// One suggestion per low performer with a seller, first [`MAX_SUGGESTIONS`] only.
pub fn build_suggestions(low_performers: &[PostPerformance]) -> Vec<NewSuggestion> {
    low_performers
        .iter()
        .filter_map(|post| {
            post.seller_id.as_ref().map(|seller_id| NewSuggestion {
                seller_id: seller_id.clone(),
                suggestion_type: SUGGESTION_TYPE.to_string(),
                title: SUGGESTION_TITLE.to_string(),
                message: format!(
                    "Your ad \"{}\" has low engagement ({:.1}%). Try a clearer photo, \
                     a sharper title or a better price to attract more clicks.",
                    post.title, post.engagement
                ),
            })
        })
        .take(MAX_SUGGESTIONS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::analyze_marketing;
    use crate::model::MarketingPost;
    use chrono::TimeZone;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap()
    }

    fn post(id: &str, seller: Option<&str>, impressions: i64, clicks: i64) -> MarketingPost {
        MarketingPost {
            id: id.to_string(),
            seller_id: seller.map(str::to_string),
            title: format!("Ad {id}"),
            impressions,
            clicks,
            is_active: true,
            status: "active".to_string(),
        }
    }

    fn fraud(codes: &[&str]) -> FraudSummary {
        FraudSummary {
            suspected_count: codes.len(),
            invalid_count: 0,
            flagged_codes: codes.iter().map(|c| c.to_string()).collect(),
            total_referrals: 10,
        }
    }

    #[test]
    fn test_render_sections() {
        let marketing = analyze_marketing(&[
            post("a", Some("s1"), 100, 10),
            post("b", Some("s2"), 1000, 5),
        ]);
        let snapshot = ReportSnapshot::new(generated_at(), marketing, fraud(&["AAA", "BBB"]));
        let text = snapshot.render("");

        assert!(text.contains("Generated: 2025-06-01T12:30:00Z"));
        assert!(text.contains("- Total Posts: 2"));
        assert!(text.contains("- Active Posts: 2"));
        assert!(text.contains("- Total Impressions: 1100"));
        assert!(text.contains("- Total Clicks: 15"));
        assert!(text.contains("- Average Engagement: 1%"));
        assert!(text.contains("- Suspected Referrals: 2"));
        assert!(text.contains("- Flagged Codes: AAA, BBB"));
        assert!(text.contains("LOW PERFORMING ADS: 1"));
        assert!(!text.contains("AI INSIGHTS"));
    }

    #[test]
    fn test_render_no_fraud_says_none() {
        let snapshot = ReportSnapshot::new(generated_at(), analyze_marketing(&[]), fraud(&[]));
        let text = snapshot.render("   ");

        assert!(text.contains("- Flagged Codes: None"));
        assert!(text.contains("- Suspected Referrals: 0"));
        assert!(text.contains("- Invalid Referrals: 0"));
        assert!(!text.contains("AI INSIGHTS"));
    }

    #[test]
    fn test_fraud_summary_separates_verdicts() {
        use crate::fraud::{DetectorConfig, detect_fraud};
        use crate::model::Referral;

        let referrals: Vec<Referral> = (0..7)
            .map(|i| Referral {
                id: format!("r{i}"),
                referrer_id: if i == 6 { "ivy".into() } else { "max".into() },
                referred_user_id: if i == 6 { "ivy".into() } else { format!("u{i}") },
                referral_code: format!("C{i}"),
                is_valid: true,
                status: ReferralStatus::Pending,
                created_at: generated_at() - chrono::Duration::minutes(60 - i),
            })
            .collect();
        let mut more = referrals.clone();
        more.push(Referral {
            id: "r7".into(),
            referral_code: "C7".into(),
            referred_user_id: "u7".into(),
            referrer_id: "max".into(),
            ..referrals[0].clone()
        });

        let scan = detect_fraud(&more, generated_at(), &DetectorConfig::default());
        let summary = FraudSummary::from_scan(&scan, more.len());

        assert_eq!(summary.suspected_count, 2);
        assert_eq!(summary.invalid_count, 1);
        assert_eq!(summary.flagged_codes.len(), 3);

        let text = ReportSnapshot::new(generated_at(), analyze_marketing(&[]), summary).render("");
        assert!(text.contains("- Suspected Referrals: 2\n- Invalid Referrals: 1\n"));
    }

    #[test]
    fn test_render_with_insights() {
        let snapshot = ReportSnapshot::new(generated_at(), analyze_marketing(&[]), fraud(&[]));
        let text = snapshot.render("Promote weekend deals.");

        assert!(text.ends_with("AI INSIGHTS\nPromote weekend deals.\n"));
    }

    #[test]
    fn test_title_has_date() {
        let snapshot = ReportSnapshot::new(generated_at(), analyze_marketing(&[]), fraud(&[]));
        assert_eq!(snapshot.title(), "Weekly Summary - 2025-06-01");
    }

    #[test]
    fn test_data_matches_rendered_figures() {
        let marketing = analyze_marketing(&[post("a", Some("s1"), 100, 1)]);
        let snapshot = ReportSnapshot::new(generated_at(), marketing, fraud(&["XYZ"]));
        let data = snapshot.data();

        assert_eq!(data["marketing"]["total_posts"], 1);
        assert_eq!(data["marketing"]["total_impressions"], 100);
        assert_eq!(data["marketing"]["avg_engagement"], 1);
        assert_eq!(data["fraud"]["suspected_count"], 1);
        assert_eq!(data["fraud"]["flagged_codes"][0], "XYZ");
        assert_eq!(data["low_performing_ads"], 1);
        assert_eq!(data["generated_at"], "2025-06-01T12:30:00Z");
    }

    #[test]
    fn test_suggestions_skip_missing_seller_and_cap() {
        let mut posts = vec![post("orphan", None, 1000, 1)];
        for i in 0..7 {
            posts.push(post(&format!("p{i}"), Some(&format!("s{i}")), 1000, 1));
        }
        let marketing = analyze_marketing(&posts);
        assert_eq!(marketing.low_performers.len(), 8);

        let suggestions = build_suggestions(&marketing.low_performers);
        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
        let sellers: Vec<_> = suggestions.iter().map(|s| s.seller_id.as_str()).collect();
        assert_eq!(sellers, vec!["s0", "s1", "s2", "s3", "s4"]);
    }

    #[test]
    fn test_suggestion_message() {
        let marketing = analyze_marketing(&[post("x", Some("s9"), 1000, 15)]);
        let suggestions = build_suggestions(&marketing.low_performers);

        assert_eq!(suggestions.len(), 1);
        let s = &suggestions[0];
        assert_eq!(s.suggestion_type, "marketing");
        assert_eq!(s.title, "Low Performing Ad");
        assert!(s.message.contains("\"Ad x\""));
        assert!(s.message.contains("(1.5%)"));
    }

    #[test]
    fn test_compile_report() {
        let snapshot = ReportSnapshot::new(generated_at(), analyze_marketing(&[]), fraud(&[]));
        let compiled = compile_report(&snapshot, "");

        assert_eq!(compiled.report.report_type, "weekly_summary");
        assert_eq!(compiled.report.content, snapshot.render(""));
        assert_eq!(compiled.report.data, snapshot.data());
        assert!(compiled.suggestions.is_empty());
    }
}
