//! Natural-language insights for the weekly report.
//!
//! Insights come from an OpenAI-compatible chat completions endpoint. The
//! call is optional: when it is unconfigured or fails, the report is compiled
//! without an insights section. See [`generate_or_empty`].
//!
//! # API Reference
//!
//! See: <https://platform.openai.com/docs/api-reference/chat/create>

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregation::MarketingSummary;
use crate::fraud::FraudScan;

/// Base URL for the chat completions gateway.
pub const DEFAULT_INSIGHT_API_BASE: &str = "https://api.openai.com/v1";

/// Model used when none is configured.
pub const DEFAULT_INSIGHT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are the AI manager of an online marketplace in Rwanda. \
     Analyze the weekly figures you are given and reply with concise, actionable \
     recommendations for the admin team in under 200 words.";

#[async_trait]
pub trait InsightProvider: Send + Sync {
    /// Produce a short prose analysis for `prompt`.
    async fn generate_insight(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Provider used when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledInsight;

#[async_trait]
impl InsightProvider for DisabledInsight {
    async fn generate_insight(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

/// Client for an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct ChatInsightClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatInsightClient {
    /// Create a client against the default gateway.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token for the gateway
    /// * `model` - Chat model name
    /// * `timeout` - Upper bound for the single request attempt
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_INSIGHT_API_BASE, api_key, model, timeout)
    }

    /// Create a client with a custom base URL (self-hosted gateways, testing).
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl InsightProvider for ChatInsightClient {
    async fn generate_insight(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let data = response.json::<ChatResponse>().await?;
        Ok(data.first_content().unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response from the chat completions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Trimmed text of the first choice, if any.
    pub fn first_content(&self) -> Option<String> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(|s| s.trim().to_string())
    }
}

/// Call `provider` once, turning any failure into an empty insight.
pub async fn generate_or_empty(provider: &dyn InsightProvider, prompt: &str) -> String {
    match provider.generate_insight(prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Insight generation failed, continuing without insights");
            String::new()
        }
    }
}

/// Render the run's figures into the user prompt.
pub fn build_prompt(
    marketing: &MarketingSummary,
    fraud: &FraudScan,
    total_referrals: usize,
    recent_fraud_logs: usize,
) -> String {
    format!(
        "Marketing: {} posts ({} active, {} pending), {} impressions, {} clicks, \
         {}% average engagement, {} low performing ads.\n\
         Referrals: {} total, {} suspicious detections this run, {} fraud log entries recently.\n\
         Give the admin team the most important risks and next steps.",
        marketing.total_posts,
        marketing.active_posts,
        marketing.pending_posts,
        marketing.total_impressions,
        marketing.total_clicks,
        marketing.avg_engagement,
        marketing.low_performers.len(),
        total_referrals,
        fraud.flagged_count(),
        recent_fraud_logs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::analyze_marketing;

    struct FailingInsight;

    #[async_trait]
    impl InsightProvider for FailingInsight {
        async fn generate_insight(&self, _prompt: &str) -> anyhow::Result<String> {
            anyhow::bail!("gateway unreachable")
        }
    }

    struct EchoInsight;

    #[async_trait]
    impl InsightProvider for EchoInsight {
        async fn generate_insight(&self, prompt: &str) -> anyhow::Result<String> {
            Ok(format!("echo: {prompt}"))
        }
    }

    #[tokio::test]
    async fn test_failure_becomes_empty() {
        assert_eq!(generate_or_empty(&FailingInsight, "p").await, "");
    }

    #[tokio::test]
    async fn test_success_is_passed_through() {
        assert_eq!(generate_or_empty(&EchoInsight, "p").await, "echo: p");
    }

    #[tokio::test]
    async fn test_disabled_is_empty() {
        assert_eq!(generate_or_empty(&DisabledInsight, "p").await, "");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_degrades() {
        // Nothing listens on port 9 on the loopback interface
        let client = ChatInsightClient::with_base_url(
            "http://127.0.0.1:9",
            "key",
            DEFAULT_INSIGHT_MODEL,
            Duration::from_secs(2),
        )
        .unwrap();

        assert_eq!(generate_or_empty(&client, "p").await, "");
    }

    #[test]
    fn test_parse_chat_response() {
        let json = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  Boost ads.\n"}}
            ]
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.first_content().as_deref(), Some("Boost ads."));
    }

    #[test]
    fn test_parse_chat_response_without_choices() {
        let response: ChatResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.first_content(), None);
    }

    #[test]
    fn test_build_prompt_mentions_figures() {
        let marketing = analyze_marketing(&[]);
        let prompt = build_prompt(&marketing, &FraudScan::default(), 12, 3);

        assert!(prompt.contains("0 posts"));
        assert!(prompt.contains("12 total"));
        assert!(prompt.contains("3 fraud log entries"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ChatInsightClient::with_base_url(
            "http://localhost:8080/v1/",
            "key",
            "m",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }
}
