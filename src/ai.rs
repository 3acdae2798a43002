// src/ai.rs
// Ranking/summarization capability seam. The contract with every caller is:
// a text prompt goes in, free text comes back that is expected to contain a
// single JSON object, optionally wrapped in a fenced code block.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One chat-style completion request. Per-stage knobs (model, temperature,
/// token budget, timeout) travel with the request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[async_trait::async_trait]
pub trait ChatCapability: Send + Sync {
    async fn complete(&self, req: &ChatRequest) -> Result<String>;
    fn provider_name(&self) -> &'static str;
}

/// Shared handle used by pipeline stages.
pub type SharedCapability = Arc<dyn ChatCapability>;

/// Unwrap an optional ```json / ``` fence and return the JSON slice.
/// Every stage parses through this one routine.
pub fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return rest[..end].trim();
        }
        return rest.trim();
    }
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return rest[..end].trim();
        }
        return rest.trim();
    }
    text.trim()
}

/// OpenAI Chat Completions provider. Requires an API key.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("usstock-news-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
        }
    }

    /// Point at a compatible endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct WireMsg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireReq<'a> {
    model: &'a str,
    messages: Vec<WireMsg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct WireResp {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMsg,
}

#[derive(Deserialize)]
struct WireChoiceMsg {
    content: String,
}

#[async_trait::async_trait]
impl ChatCapability for OpenAiClient {
    async fn complete(&self, req: &ChatRequest) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(anyhow!("no API key configured"));
        }

        let body = WireReq {
            model: &req.model,
            messages: vec![
                WireMsg {
                    role: "system",
                    content: &req.system,
                },
                WireMsg {
                    role: "user",
                    content: &req.user,
                },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(req.timeout)
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("chat completion returned HTTP {status}"));
        }

        let parsed: WireResp = resp.json().await.context("chat completion body")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic capability for tests: replays a scripted sequence of
/// replies (or failures) in order, recording every request it sees.
pub struct MockCapability {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockCapability {
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self::with_script(vec![Ok(reply.into())])
    }

    pub fn with_script(script: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::with_script(vec![Err(anyhow!("simulated HTTP 500"))])
    }

    /// Requests observed so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .expect("mock capability mutex poisoned")
            .clone()
    }
}

#[async_trait::async_trait]
impl ChatCapability for MockCapability {
    async fn complete(&self, req: &ChatRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("mock capability mutex poisoned")
            .push(req.clone());
        self.replies
            .lock()
            .expect("mock capability mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("mock capability script exhausted")))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_json_passes_through() {
        assert_eq!(extract_json(r#" {"a": 1} "#), r#"{"a": 1}"#);
    }

    #[test]
    fn json_fence_is_unwrapped() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(extract_json(text), r#"{"a": 1}"#);
    }

    #[test]
    fn anonymous_fence_is_unwrapped() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text), r#"{"a": 1}"#);
    }

    #[test]
    fn unterminated_fence_still_yields_tail() {
        let text = "```json\n{\"a\": 1}";
        assert_eq!(extract_json(text), r#"{"a": 1}"#);
    }

    #[tokio::test]
    async fn mock_script_replays_in_order() {
        let mock = MockCapability::with_script(vec![
            Ok("one".into()),
            Err(anyhow!("boom")),
        ]);
        let req = ChatRequest {
            system: String::new(),
            user: String::new(),
            model: "m".into(),
            temperature: 0.0,
            max_tokens: 1,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(mock.complete(&req).await.unwrap(), "one");
        assert!(mock.complete(&req).await.is_err());
        assert!(mock.complete(&req).await.is_err()); // exhausted
    }
}
