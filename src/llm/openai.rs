use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Config, env_or};
use crate::error::{JarvisError, Result};
use crate::llm::{AssistantReply, ChatBackend, ChatRequest, Message, ToolCall, ToolChoice};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Chat backend for any OpenAI-compatible `/chat/completions` endpoint.
/// Defaults to Groq.
///
/// Configuration priority (highest → lowest):
///   1. Environment variables (`GROQ_API_KEY`, `GROQ_MODEL`, `GROQ_BASE_URL`)
///   2. `[llm]` section of `config.toml`
///   3. Built-in defaults
pub struct OpenAiCompatBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

// -- Wire types -------------------------------------------------------------

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiCompatBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?;
        let base_url = env_or("GROQ_BASE_URL", &config.llm.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model =
            env_or("GROQ_MODEL", &config.llm.model).unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = config.llm.timeout_secs;
        let client = Client::builder()
            .timeout(if timeout_secs > 0 {
                Duration::from_secs(timeout_secs)
            } else {
                Duration::from_secs(300)
            })
            .build()
            .map_err(|e| JarvisError::Config(format!("failed to create HTTP client: {e}")))?;

        info!(model = %model, base_url = %base_url, timeout_secs, "chat backend initialized");

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn body<'a>(&'a self, request: &ChatRequest<'a>) -> WireRequest<'a> {
        WireRequest {
            model: &self.model,
            messages: request.messages,
            max_tokens: request.max_tokens,
            tools: request
                .tools
                .map(|schemas| schemas.iter().map(|s| s.to_definition()).collect()),
            tool_choice: request.tool_choice,
        }
    }
}

/// Provider error text, preferring `{"error":{"message":..}}` when present.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map(|e| e.message)
        .unwrap_or_else(|| body.to_string())
}

fn into_reply(resp: ChatResponse) -> Result<AssistantReply> {
    if let Some(ref usage) = resp.usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "chat usage"
        );
    }

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| JarvisError::Llm("response contained no choices".into()))?;

    Ok(AssistantReply {
        content: choice.message.content,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
    })
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        "OpenAI-compatible API"
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<AssistantReply> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.body(request);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.map_or(0, |t| t.len()),
            max_tokens = request.max_tokens,
            "invoking chat completions"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| JarvisError::Llm(format!("chat request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = error_message(&text);
            warn!(status = %status, error = %message, "chat API error");
            return Err(JarvisError::Llm(format!("chat API returned {status}: {message}")));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| JarvisError::Llm(format!("failed to parse chat response: {e}")))?;

        let reply = into_reply(parsed)?;
        info!(
            content_len = reply.content.as_deref().map_or(0, str::len),
            tool_calls = reply.tool_calls.len(),
            "chat response received"
        );
        Ok(reply)
    }
}
