//! Narration through the Anthropic Messages API.

use super::{NarrativeConfig, NarrativeContext, NarrativeError, NarrativeProvider};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Claude-backed narrative provider.
#[derive(Clone)]
pub struct ClaudeNarrator {
    client: reqwest::Client,
    api_key: String,
    config: NarrativeConfig,
}

impl ClaudeNarrator {
    pub fn new(
        api_key: impl Into<String>,
        config: NarrativeConfig,
    ) -> Result<Self, NarrativeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NarrativeError::Config(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    /// Create a narrator from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env(config: NarrativeConfig) -> Result<Self, NarrativeError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| NarrativeError::NoApiKey)?;
        Self::new(api_key, config)
    }

    fn build_headers(&self) -> Result<HeaderMap, NarrativeError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| NarrativeError::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_request(&self, context: &NarrativeContext) -> ApiRequest {
        let (system, user) = context.prompt();
        ApiRequest {
            model: self
                .config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: self.config.max_tokens,
            system: Some(system.to_string()),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: user,
            }],
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl NarrativeProvider for ClaudeNarrator {
    async fn describe(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        if !self.config.enabled {
            return Err(NarrativeError::Disabled);
        }
        let headers = self.build_headers()?;
        debug!(kind = ?context.kind, "requesting narrative");

        let response = self
            .client
            .post(format!("{API_BASE}/messages"))
            .headers(headers)
            .json(&self.build_request(context))
            .send()
            .await
            .map_err(|e| NarrativeError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| NarrativeError::Parse(e.to_string()))?;

        let text = api_response.text();
        if text.trim().is_empty() {
            return Err(NarrativeError::Empty);
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
}

impl ApiResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ApiContent::Text { text } => Some(text.as_str()),
                ApiContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::NarrativeKind;

    #[test]
    fn test_request_uses_config() {
        let config = NarrativeConfig::default()
            .with_model("claude-test")
            .with_max_tokens(64);
        let narrator = ClaudeNarrator::new("key", config).unwrap();
        let ctx =
            NarrativeContext::new(NarrativeKind::Room, "Castle of Shadows", "Ash").with_room(3);
        let request = serde_json::to_value(narrator.build_request(&ctx)).unwrap();
        assert_eq!(request["model"], "claude-test");
        assert_eq!(request["max_tokens"], 64);
        assert_eq!(request["messages"][0]["role"], "user");
        assert!(request["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("Room: 3"));
    }

    #[test]
    fn test_response_text_skips_other_blocks() {
        let response: ApiResponse = serde_json::from_str(
            r#"{"content":[{"type":"thinking","thinking":"..."},{"type":"text","text":"A cold draft."}]}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "A cold draft.");
    }

    #[tokio::test]
    async fn test_disabled_narrator_refuses() {
        let narrator =
            ClaudeNarrator::new("key", NarrativeConfig::default().with_enabled(false)).unwrap();
        let ctx = NarrativeContext::new(NarrativeKind::Camp, "Castle of Shadows", "Ash");
        assert!(matches!(
            narrator.describe(&ctx).await,
            Err(NarrativeError::Disabled)
        ));
    }
}
