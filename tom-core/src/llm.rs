//! The LLM adapter: a single `call_llm` entry point shared by the triage
//! and execute phases, wrapping OpenAI-compatible chat-completions clients
//! across providers and folding in the per-provider quirks (Mistral's
//! throttle, DeepSeek's empty-`parameters` stripping, 5xx retries).

use crate::error::{Result, TomError};
use crate::model::{MessageRole, ToolCallRequest};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

lazy_static! {
    /// One pooled client for every outbound LLM call, following the
    /// teacher's `SHARED_HTTP_CLIENT` pattern so TLS sessions and DNS
    /// lookups stay warm across turns.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build shared LLM http client");
}

/// A chat message in the OpenAI-compatible wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    pub arguments: String,
}

impl From<&crate::model::ConversationMessage> for WireMessage {
    fn from(m: &crate::model::ConversationMessage) -> Self {
        let role = match m.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };
        WireMessage {
            role: role.to_string(),
            content: m.content.clone(),
            tool_call_id: m.tool_call_id.clone(),
            tool_calls: m.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        kind: "function".to_string(),
                        function: WireFunctionCall {
                            name: c.function_name.clone(),
                            arguments: c.arguments_json.clone(),
                        },
                    })
                    .collect()
            }),
        }
    }
}

/// A tool definition offered to the model, JSON-schema parameters + strict flag.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ToolSpecFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpecFunction {
    pub name: String,
    pub description: String,
    pub strict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        ToolSpec {
            kind: "function",
            function: ToolSpecFunction {
                name: name.into(),
                description: description.into(),
                strict: true,
                parameters: Some(parameters),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [WireMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSpec]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    finish_reason: String,
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

/// Outcome of a single `call_llm` invocation.
#[derive(Debug, Clone)]
pub enum LlmOutcome {
    /// `finish_reason = stop`: a final assistant answer.
    Stop { content: String },
    /// `finish_reason = tool_calls`: the model wants to invoke tools.
    ToolCalls { calls: Vec<ToolCallRequest> },
}

/// One configured LLM provider: three model tiers plus its API key/base URL.
pub struct LlmProvider {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    pub models: [String; 3],
    last_request_at: Mutex<Option<std::time::Instant>>,
}

impl LlmProvider {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, base_url: impl Into<String>, models: [String; 3]) -> Self {
        LlmProvider {
            name: name.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            models,
            last_request_at: Mutex::new(None),
        }
    }

    /// Mistral enforces at most one request per 1.5s; every other provider
    /// is unthrottled at this layer.
    async fn throttle(&self) {
        if self.name != "mistral" {
            return;
        }
        let mut guard = self.last_request_at.lock().await;
        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            let min_gap = Duration::from_millis(1500);
            if elapsed < min_gap {
                tokio::time::sleep(min_gap - elapsed).await;
            }
        }
        *guard = Some(std::time::Instant::now());
    }

    /// DeepSeek rejects tool specs carrying an empty `parameters` object;
    /// strip it so the request validates.
    fn sanitize_tools(&self, tools: &[ToolSpec]) -> Vec<ToolSpec> {
        if self.name != "deepseek" {
            return tools.to_vec();
        }
        tools
            .iter()
            .cloned()
            .map(|mut t| {
                if matches!(&t.function.parameters, Some(Value::Object(m)) if m.is_empty()) {
                    t.function.parameters = None;
                }
                t
            })
            .collect()
    }
}

impl Clone for ToolSpec {
    fn clone(&self) -> Self {
        ToolSpec {
            kind: self.kind,
            function: self.function.clone(),
        }
    }
}
impl Clone for ToolSpecFunction {
    fn clone(&self) -> Self {
        ToolSpecFunction {
            name: self.name.clone(),
            description: self.description.clone(),
            strict: self.strict,
            parameters: self.parameters.clone(),
        }
    }
}

/// The registry of configured providers, keyed by name, plus the default.
pub struct LlmRegistry {
    pub providers: HashMap<String, LlmProvider>,
    pub default: String,
}

impl LlmRegistry {
    /// Call the LLM, applying provider quirks and a 2x/300ms 5xx retry.
    ///
    /// `complexity` selects the model tier (0/1/2). `provider_override`
    /// lets a module pin a non-default provider, the way a behavior hook
    /// can request its own LLM instance rather than the user's default.
    pub async fn call_llm(
        &self,
        messages: &[WireMessage],
        tools: Option<&[ToolSpec]>,
        complexity: usize,
        provider_override: Option<&str>,
    ) -> Result<LlmOutcome> {
        let provider_name = provider_override.unwrap_or(&self.default);
        let provider = self
            .providers
            .get(provider_name)
            .ok_or_else(|| TomError::Config(format!("LLM provider '{provider_name}' not configured")))?;

        provider.throttle().await;

        let model = &provider.models[complexity.min(2)];
        let sanitized = tools.map(|t| provider.sanitize_tools(t));
        let tools_slice = sanitized.as_deref();

        let body = ChatRequest {
            model,
            temperature: 0.0,
            messages,
            tools: tools_slice,
            tool_choice: tools_slice.map(|_| "auto"),
        };

        let mut retries = 0;
        loop {
            let response = SHARED_HTTP_CLIENT
                .post(format!("{}/chat/completions", provider.base_url))
                .bearer_auth(&provider.api_key)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_server_error() {
                        if retries < 2 {
                            retries += 1;
                            log::warn!(
                                "LLM provider '{provider_name}' returned {status}, retrying ({retries}/2)"
                            );
                            tokio::time::sleep(Duration::from_millis(300)).await;
                            continue;
                        }
                        return Err(TomError::LlmTransient(format!("{provider_name} returned {status}")));
                    }
                    if !status.is_success() {
                        return Err(TomError::LlmPermanent(format!("{provider_name} returned {status}")));
                    }
                    let parsed: ChatResponse = resp
                        .json()
                        .await
                        .map_err(|e| TomError::LlmPermanent(format!("malformed response: {e}")))?;
                    let choice = parsed
                        .choices
                        .into_iter()
                        .next()
                        .ok_or_else(|| TomError::LlmPermanent("empty choices array".into()))?;

                    return match choice.finish_reason.as_str() {
                        "stop" => Ok(LlmOutcome::Stop {
                            content: choice.message.content.unwrap_or_default(),
                        }),
                        "tool_calls" => Ok(LlmOutcome::ToolCalls {
                            calls: choice
                                .message
                                .tool_calls
                                .into_iter()
                                .map(|c| ToolCallRequest {
                                    id: c.id,
                                    function_name: c.function.name,
                                    arguments_json: c.function.arguments,
                                })
                                .collect(),
                        }),
                        other => Err(TomError::LlmPermanent(format!("unexpected finish_reason '{other}'"))),
                    };
                }
                Err(e) if retries < 2 => {
                    retries += 1;
                    log::warn!("LLM provider '{provider_name}' request failed: {e}, retrying ({retries}/2)");
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    continue;
                }
                Err(e) => return Err(TomError::from(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deepseek_strips_empty_parameters() {
        let provider = LlmProvider::new("deepseek", "key", "https://api.deepseek.com", [
            "a".into(), "b".into(), "c".into(),
        ]);
        let tools = vec![ToolSpec::new("noop", "does nothing", serde_json::json!({}))];
        let sanitized = provider.sanitize_tools(&tools);
        assert!(sanitized[0].function.parameters.is_none());
    }

    #[test]
    fn openai_leaves_parameters_intact() {
        let provider = LlmProvider::new("openai", "key", "https://api.openai.com/v1", [
            "a".into(), "b".into(), "c".into(),
        ]);
        let tools = vec![ToolSpec::new("noop", "does nothing", serde_json::json!({}))];
        let sanitized = provider.sanitize_tools(&tools);
        assert!(sanitized[0].function.parameters.is_some());
    }
}
