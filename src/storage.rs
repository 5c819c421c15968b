//! SQLite storage layer for the AI Manager.
//!
//! [`MarketplaceStore`] is the set of backend operations the job depends on.
//! [`Storage`] implements it over a SQLite pool and adds the read endpoints
//! used by the admin API.
//!
//! Timestamps are stored as Unix seconds. Rows created by the job get a
//! random UUID as id.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use uuid::Uuid;

use crate::model::{
    MarketingPost, NewReferralLog, NewReport, NewSuggestion, Referral, ReferralLog, ReferralUpdate,
    Report, Suggestion,
};

/// Backend operations consumed by one job run.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    /// All referrals, in insertion order.
    async fn list_referrals(&self) -> anyhow::Result<Vec<Referral>>;

    async fn list_marketing_posts(&self) -> anyhow::Result<Vec<MarketingPost>>;

    /// Most recent fraud log entries, newest first.
    async fn list_recent_referral_logs(&self, limit: u32) -> anyhow::Result<Vec<ReferralLog>>;

    async fn update_referral(&self, id: &str, update: &ReferralUpdate) -> anyhow::Result<()>;

    async fn insert_referral_log(&self, entry: &NewReferralLog) -> anyhow::Result<ReferralLog>;

    async fn insert_report(&self, entry: &NewReport) -> anyhow::Result<Report>;

    async fn insert_suggestion(&self, entry: &NewSuggestion) -> anyhow::Result<Suggestion>;
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:ai_manager.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS referrals (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                referrer_id TEXT NOT NULL,
                referred_user_id TEXT NOT NULL,
                referral_code TEXT NOT NULL,
                is_valid INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS marketing_posts (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                seller_id TEXT,
                title TEXT NOT NULL,
                impressions INTEGER NOT NULL,
                clicks INTEGER NOT NULL,
                is_active INTEGER NOT NULL,
                status TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS referral_logs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                referral_id TEXT NOT NULL,
                referral_code TEXT NOT NULL,
                status TEXT NOT NULL,
                reason TEXT NOT NULL,
                detected_by TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                report_type TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS suggestions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                seller_id TEXT NOT NULL,
                suggestion_type TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            // Burst detection groups by referrer
            r#"
            CREATE INDEX IF NOT EXISTS idx_referrals_referrer
            ON referrals(referrer_id, created_at)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_suggestions_seller
            ON suggestions(seller_id)
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Record a referral as the redemption flow would.
    pub async fn insert_referral(&self, referral: &Referral) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO referrals
                (id, referrer_id, referred_user_id, referral_code, is_valid, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&referral.id)
        .bind(&referral.referrer_id)
        .bind(&referral.referred_user_id)
        .bind(&referral.referral_code)
        .bind(referral.is_valid)
        .bind(referral.status.as_str())
        .bind(referral.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a marketing post as the seller dashboard would.
    pub async fn insert_marketing_post(&self, post: &MarketingPost) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO marketing_posts
                (id, seller_id, title, impressions, clicks, is_active, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.seller_id)
        .bind(&post.title)
        .bind(post.impressions)
        .bind(post.clicks)
        .bind(post.is_active)
        .bind(&post.status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_referral(&self, id: &str) -> anyhow::Result<Option<Referral>> {
        let row = sqlx::query(
            r#"
            SELECT id, referrer_id, referred_user_id, referral_code, is_valid, status, created_at
            FROM referrals
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(referral_from_row).transpose()
    }

    /// Most recent reports, newest first.
    pub async fn list_recent_reports(&self, limit: u32) -> anyhow::Result<Vec<Report>> {
        let rows = sqlx::query(
            r#"
            SELECT id, report_type, title, content, data, created_at
            FROM reports
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(report_from_row).collect()
    }

    /// Suggestions addressed to one seller, newest first.
    pub async fn list_suggestions_for_seller(
        &self,
        seller_id: &str,
    ) -> anyhow::Result<Vec<Suggestion>> {
        let rows = sqlx::query(
            r#"
            SELECT id, seller_id, suggestion_type, title, message, created_at
            FROM suggestions
            WHERE seller_id = ?
            ORDER BY seq DESC
            "#,
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(suggestion_from_row).collect()
    }

    /// Number of suggestions across all sellers.
    pub async fn count_suggestions(&self) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suggestions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl MarketplaceStore for Storage {
    async fn list_referrals(&self) -> anyhow::Result<Vec<Referral>> {
        let rows = sqlx::query(
            r#"
            SELECT id, referrer_id, referred_user_id, referral_code, is_valid, status, created_at
            FROM referrals
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(referral_from_row).collect()
    }

    async fn list_marketing_posts(&self) -> anyhow::Result<Vec<MarketingPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, seller_id, title, impressions, clicks, is_active, status
            FROM marketing_posts
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| MarketingPost {
                id: r.get("id"),
                seller_id: r.get("seller_id"),
                title: r.get("title"),
                impressions: r.get("impressions"),
                clicks: r.get("clicks"),
                is_active: r.get("is_active"),
                status: r.get("status"),
            })
            .collect())
    }

    async fn list_recent_referral_logs(&self, limit: u32) -> anyhow::Result<Vec<ReferralLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, referral_id, referral_code, status, reason, detected_by, created_at
            FROM referral_logs
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(referral_log_from_row).collect()
    }

    async fn update_referral(&self, id: &str, update: &ReferralUpdate) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE referrals SET is_valid = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(update.is_valid)
        .bind(update.status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("referral '{id}' not found");
        }

        Ok(())
    }

    async fn insert_referral_log(&self, entry: &NewReferralLog) -> anyhow::Result<ReferralLog> {
        let log = ReferralLog {
            id: Uuid::new_v4().to_string(),
            referral_id: entry.referral_id.clone(),
            referral_code: entry.referral_code.clone(),
            status: entry.status,
            reason: entry.reason.clone(),
            detected_by: entry.detected_by.clone(),
            created_at: now_seconds()?,
        };

        sqlx::query(
            r#"
            INSERT INTO referral_logs
                (id, referral_id, referral_code, status, reason, detected_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.id)
        .bind(&log.referral_id)
        .bind(&log.referral_code)
        .bind(log.status.as_str())
        .bind(&log.reason)
        .bind(&log.detected_by)
        .bind(log.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(log)
    }

    async fn insert_report(&self, entry: &NewReport) -> anyhow::Result<Report> {
        let report = Report {
            id: Uuid::new_v4().to_string(),
            report_type: entry.report_type.clone(),
            title: entry.title.clone(),
            content: entry.content.clone(),
            data: entry.data.clone(),
            created_at: now_seconds()?,
        };

        sqlx::query(
            r#"
            INSERT INTO reports (id, report_type, title, content, data, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.id)
        .bind(&report.report_type)
        .bind(&report.title)
        .bind(&report.content)
        .bind(serde_json::to_string(&report.data)?)
        .bind(report.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(report)
    }

    async fn insert_suggestion(&self, entry: &NewSuggestion) -> anyhow::Result<Suggestion> {
        let suggestion = Suggestion {
            id: Uuid::new_v4().to_string(),
            seller_id: entry.seller_id.clone(),
            suggestion_type: entry.suggestion_type.clone(),
            title: entry.title.clone(),
            message: entry.message.clone(),
            created_at: now_seconds()?,
        };

        sqlx::query(
            r#"
            INSERT INTO suggestions (id, seller_id, suggestion_type, title, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&suggestion.id)
        .bind(&suggestion.seller_id)
        .bind(&suggestion.suggestion_type)
        .bind(&suggestion.title)
        .bind(&suggestion.message)
        .bind(suggestion.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(suggestion)
    }
}

/// Current time truncated to the stored precision.
fn now_seconds() -> anyhow::Result<DateTime<Utc>> {
    from_unix(Utc::now().timestamp())
}

fn from_unix(ts: i64) -> anyhow::Result<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("timestamp {ts} out of range"))
}

fn referral_from_row(row: &SqliteRow) -> anyhow::Result<Referral> {
    let status: String = row.get("status");
    Ok(Referral {
        id: row.get("id"),
        referrer_id: row.get("referrer_id"),
        referred_user_id: row.get("referred_user_id"),
        referral_code: row.get("referral_code"),
        is_valid: row.get("is_valid"),
        status: status.parse()?,
        created_at: from_unix(row.get("created_at"))?,
    })
}

fn referral_log_from_row(row: &SqliteRow) -> anyhow::Result<ReferralLog> {
    let status: String = row.get("status");
    Ok(ReferralLog {
        id: row.get("id"),
        referral_id: row.get("referral_id"),
        referral_code: row.get("referral_code"),
        status: status.parse()?,
        reason: row.get("reason"),
        detected_by: row.get("detected_by"),
        created_at: from_unix(row.get("created_at"))?,
    })
}

fn report_from_row(row: &SqliteRow) -> anyhow::Result<Report> {
    let data: String = row.get("data");
    Ok(Report {
        id: row.get("id"),
        report_type: row.get("report_type"),
        title: row.get("title"),
        content: row.get("content"),
        data: serde_json::from_str(&data)?,
        created_at: from_unix(row.get("created_at"))?,
    })
}

fn suggestion_from_row(row: &SqliteRow) -> anyhow::Result<Suggestion> {
    Ok(Suggestion {
        id: row.get("id"),
        seller_id: row.get("seller_id"),
        suggestion_type: row.get("suggestion_type"),
        title: row.get("title"),
        message: row.get("message"),
        created_at: from_unix(row.get("created_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogStatus, ReferralStatus};
    use tokio_test::assert_ok;

    async fn setup_test_storage() -> Storage {
        Storage::new("sqlite::memory:").await.unwrap()
    }

    fn referral(id: &str) -> Referral {
        Referral {
            id: id.to_string(),
            referrer_id: "referrer".to_string(),
            referred_user_id: format!("user-{id}"),
            referral_code: format!("CODE-{id}"),
            is_valid: true,
            status: ReferralStatus::Pending,
            created_at: from_unix(1_700_000_000).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_referrals() {
        let storage = setup_test_storage().await;

        for id in ["r3", "r1", "r2"] {
            storage.insert_referral(&referral(id)).await.unwrap();
        }

        let referrals = storage.list_referrals().await.unwrap();
        let ids: Vec<_> = referrals.iter().map(|r| r.id.as_str()).collect();
        // Insertion order, not id order
        assert_eq!(ids, vec!["r3", "r1", "r2"]);
        assert_eq!(referrals[0], referral("r3"));
    }

    #[tokio::test]
    async fn test_update_referral() {
        let storage = setup_test_storage().await;
        storage.insert_referral(&referral("r1")).await.unwrap();

        let update = ReferralUpdate {
            is_valid: false,
            status: ReferralStatus::Suspected,
        };
        assert_ok!(storage.update_referral("r1", &update).await);

        let stored = storage.get_referral("r1").await.unwrap().unwrap();
        assert!(!stored.is_valid);
        assert_eq!(stored.status, ReferralStatus::Suspected);
    }

    #[tokio::test]
    async fn test_update_missing_referral_fails() {
        let storage = setup_test_storage().await;
        let update = ReferralUpdate {
            is_valid: false,
            status: ReferralStatus::Invalid,
        };
        assert!(storage.update_referral("ghost", &update).await.is_err());
    }

    #[tokio::test]
    async fn test_marketing_posts_round_trip() {
        let storage = setup_test_storage().await;
        let post = MarketingPost {
            id: "p1".to_string(),
            seller_id: None,
            title: "Imigongo art".to_string(),
            impressions: 120,
            clicks: 7,
            is_active: false,
            status: "pending".to_string(),
        };
        storage.insert_marketing_post(&post).await.unwrap();

        let posts = storage.list_marketing_posts().await.unwrap();
        assert_eq!(posts, vec![post]);
    }

    #[tokio::test]
    async fn test_recent_referral_logs_newest_first() {
        let storage = setup_test_storage().await;

        for i in 0..3 {
            storage
                .insert_referral_log(&NewReferralLog {
                    referral_id: format!("r{i}"),
                    referral_code: format!("CODE-{i}"),
                    status: LogStatus::Suspected,
                    reason: "Mass signup detected: 6 referrals in 24 hours".to_string(),
                    detected_by: "AI Manager".to_string(),
                })
                .await
                .unwrap();
        }

        let logs = storage.list_recent_referral_logs(2).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].referral_id, "r2");
        assert_eq!(logs[1].referral_id, "r1");
        assert_eq!(logs[0].status, LogStatus::Suspected);
    }

    #[tokio::test]
    async fn test_report_data_is_preserved() {
        let storage = setup_test_storage().await;
        let data = serde_json::json!({ "fraud": { "suspected_count": 2 } });

        let inserted = storage
            .insert_report(&NewReport {
                report_type: "weekly_summary".to_string(),
                title: "Weekly Summary".to_string(),
                content: "body".to_string(),
                data: data.clone(),
            })
            .await
            .unwrap();

        let reports = storage.list_recent_reports(10).await.unwrap();
        assert_eq!(reports, vec![inserted]);
        assert_eq!(reports[0].data, data);
    }

    #[tokio::test]
    async fn test_suggestions_by_seller() {
        let storage = setup_test_storage().await;

        for seller in ["s1", "s2", "s1"] {
            storage
                .insert_suggestion(&NewSuggestion {
                    seller_id: seller.to_string(),
                    suggestion_type: "marketing".to_string(),
                    title: "Low Performing Ad".to_string(),
                    message: "m".to_string(),
                })
                .await
                .unwrap();
        }

        assert_eq!(storage.list_suggestions_for_seller("s1").await.unwrap().len(), 2);
        assert_eq!(storage.list_suggestions_for_seller("s2").await.unwrap().len(), 1);
        assert!(storage.list_suggestions_for_seller("s3").await.unwrap().is_empty());
        assert_eq!(storage.count_suggestions().await.unwrap(), 3);
    }
}
