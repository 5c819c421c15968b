//! Marketing performance aggregation.
//!
//! All computations in this module are pure functions of the post list: the
//! same input always yields the same [`MarketingSummary`], field for field.

use serde::{Deserialize, Serialize};

use crate::model::MarketingPost;

/// Number of posts kept in [`MarketingSummary::top_performers`].
const TOP_PERFORMER_COUNT: usize = 5;

/// Posts below this engagement percentage are considered low performing.
pub const LOW_ENGAGEMENT_THRESHOLD: f64 = 2.0;

/// A post together with its computed engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPerformance {
    pub post_id: String,
    pub seller_id: Option<String>,
    pub title: String,
    pub impressions: i64,
    pub clicks: i64,
    /// Unrounded percentage, used for ranking only.
    pub engagement: f64,
}

impl From<&MarketingPost> for PostPerformance {
    fn from(post: &MarketingPost) -> Self {
        Self {
            post_id: post.id.clone(),
            seller_id: post.seller_id.clone(),
            title: post.title.clone(),
            impressions: post.impressions,
            clicks: post.clicks,
            engagement: post.engagement(),
        }
    }
}

/// Aggregate marketing figures for one job run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingSummary {
    pub total_posts: usize,
    /// Posts that are both switched on and approved.
    pub active_posts: usize,
    pub pending_posts: usize,
    pub total_impressions: i64,
    pub total_clicks: i64,
    /// Rounded whole percentage across all posts.
    pub avg_engagement: i64,
    /// Highest engagement first, at most five.
    pub top_performers: Vec<PostPerformance>,
    /// Every post under [`LOW_ENGAGEMENT_THRESHOLD`], in input order.
    pub low_performers: Vec<PostPerformance>,
}

/// Aggregate a batch of marketing posts.
///
/// A post without impressions has zero engagement, so it counts as low
/// performing. Posts without a seller are still aggregated.
pub fn analyze_marketing(posts: &[MarketingPost]) -> MarketingSummary {
    let active_posts = posts
        .iter()
        .filter(|p| p.is_active && p.status == "active")
        .count();
    let pending_posts = posts.iter().filter(|p| p.status == "pending").count();
    let total_impressions: i64 = posts.iter().map(|p| p.impressions).sum();
    let total_clicks: i64 = posts.iter().map(|p| p.clicks).sum();

    let avg_engagement = if total_impressions > 0 {
        (total_clicks as f64 / total_impressions as f64 * 100.0).round() as i64
    } else {
        0
    };

    let performances: Vec<PostPerformance> = posts.iter().map(PostPerformance::from).collect();

    let mut ranked = performances.clone();
    // Stable sort: ties keep input order
    ranked.sort_by(|a, b| b.engagement.total_cmp(&a.engagement));
    ranked.truncate(TOP_PERFORMER_COUNT);

    let low_performers = performances
        .into_iter()
        .filter(|p| p.engagement < LOW_ENGAGEMENT_THRESHOLD)
        .collect();

    MarketingSummary {
        total_posts: posts.len(),
        active_posts,
        pending_posts,
        total_impressions,
        total_clicks,
        avg_engagement,
        top_performers: ranked,
        low_performers,
    }
}
