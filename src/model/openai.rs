//! OpenAI-compatible chat-completions client.

use super::{ChatMessage, Conversation, ModelClient, NEXT_ACTION_SYSTEM_PROMPT};
use crate::config::LlmConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn image_part(screenshot: &[u8]) -> Value {
        let encoded = base64::engine::general_purpose::STANDARD.encode(screenshot);
        json!({
            "type": "image_url",
            "image_url": {
                "url": format!("data:image/png;base64,{encoded}"),
                "detail": "high",
            }
        })
    }

    async fn chat(&self, messages: Vec<Value>, max_tokens: u32) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": 0.1,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("model request failed")?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .context("model response was not JSON")?;

        if !status.is_success() {
            bail!("model returned {status}: {payload}");
        }

        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();

        debug!(chars = content.len(), "model response received");
        Ok(content)
    }
}

fn to_wire(message: &ChatMessage) -> Value {
    json!({ "role": message.role, "content": message.content })
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn vision(&self, screenshot: &[u8], prompt: &str) -> Result<String> {
        let messages = vec![json!({
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                Self::image_part(screenshot),
            ]
        })];
        self.chat(messages, 2000).await
    }

    async fn next_action(
        &self,
        conversation: &mut Conversation,
        screenshot: &[u8],
        page_text: &str,
        instruction: &str,
        current_url: &str,
    ) -> Result<String> {
        let user_content = json!([
            {
                "type": "text",
                "text": format!(
                    "Current URL: {current_url}\n\nTagged elements:\n{page_text}\n\n\
                     Instruction: {instruction}\n\n\
                     Analyze the screenshot and element listing, then output the next command."
                ),
            },
            Self::image_part(screenshot),
        ]);

        let mut messages = vec![json!({
            "role": "system",
            "content": NEXT_ACTION_SYSTEM_PROMPT,
        })];
        messages.extend(conversation.messages().iter().map(to_wire));
        messages.push(json!({ "role": "user", "content": user_content.clone() }));

        let reply = self.chat(messages, 500).await?;

        conversation.push_user(user_content);
        conversation.push_assistant(&reply);
        Ok(reply)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let messages = vec![json!({ "role": "user", "content": prompt })];
        self.chat(messages, 2000).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base: &str) -> OpenAiClient {
        OpenAiClient::new(&LlmConfig {
            api_base: base.to_string(),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
        })
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
    }

    #[tokio::test]
    async fn test_complete_returns_trimmed_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  DONE \n")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let reply = client.complete("say done").await.unwrap();
        assert_eq!(reply, "DONE");
    }

    #[tokio::test]
    async fn test_next_action_appends_conversation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("CLICK [3]")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut conversation = Conversation::new();
        let reply = client
            .next_action(
                &mut conversation,
                b"\x89PNG",
                "[@3] Reports",
                "open reports",
                "https://a.com/",
            )
            .await
            .unwrap();

        assert_eq!(reply, "CLICK [3]");
        // user turn + assistant turn recorded
        assert_eq!(conversation.len(), 2);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({ "error": "rate limited" })),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.complete("hi").await.is_err());
    }
}
