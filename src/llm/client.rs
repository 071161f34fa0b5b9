//! OpenAI-compatible chat-completions client with tool calling.

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::types::{ChatMessage, ChatReply, ChatRequest, CompletionResponse, ToolCall};
use crate::config::LlmConfig;
use crate::credentials::{self, CredentialSource};
use crate::error::{Result, VoiceError};

/// Id given to a tool call synthesized from a legacy `function_call` reply.
pub const LEGACY_CALL_ID: &str = "legacy_call";

/// A remote model that may answer with text or tool calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one request.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Connection`] for transport failures and timeouts,
    /// [`VoiceError::TaskFailure`] for non-success HTTP status or cancellation,
    /// and [`VoiceError::Protocol`] for unparseable replies.
    async fn complete(&self, request: ChatRequest, cancel: CancellationToken) -> Result<ChatReply>;
}

/// Chat-completions client for DashScope's OpenAI-compatible endpoint.
pub struct DashScopeChatClient {
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for DashScopeChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashScopeChatClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("api_key", &credentials::redact(&self.api_key))
            .finish()
    }
}

impl DashScopeChatClient {
    /// Create a client, resolving the API key from `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Validation`] if the key is missing, or
    /// [`VoiceError::Config`] if the HTTP client cannot be built.
    pub fn new(config: LlmConfig, credentials: &dyn CredentialSource) -> Result<Self> {
        let api_key = credentials::require(credentials, &config.api_key_env)?;
        Self::with_api_key(config, api_key)
    }

    /// Create a client with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Config`] if the HTTP client cannot be built.
    pub fn with_api_key(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| VoiceError::Config(format!("http client: {e}")))?;
        Ok(Self {
            config,
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Build the JSON request body.
    pub fn build_body(&self, request: &ChatRequest) -> serde_json::Value {
        let messages = vec![
            ChatMessage::system(&request.system_prompt),
            ChatMessage::user(&request.user_text),
        ];
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
            body["tool_choice"] = json!("auto");
            body["parallel_tool_calls"] = json!(request.parallel_tool_calls);
        }
        body
    }

    /// Parse a successful response body.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Protocol`] for malformed JSON or a reply with no choices.
    pub fn parse_reply(body: &str, legacy_function_calls: bool) -> Result<ChatReply> {
        let parsed: CompletionResponse = serde_json::from_str(body)
            .map_err(|e| VoiceError::Protocol(format!("invalid completion response: {e}")))?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| VoiceError::Protocol("completion response has no choices".to_owned()))?
            .message;

        if let Some(calls) = message.tool_calls.filter(|c| !c.is_empty()) {
            debug!(count = calls.len(), "model returned tool calls");
            return Ok(ChatReply {
                content: message.content,
                tool_calls: calls,
            });
        }
        if legacy_function_calls && let Some(function) = message.function_call {
            debug!(function = %function.name, "model returned legacy function call");
            return Ok(ChatReply {
                content: message.content,
                tool_calls: vec![ToolCall {
                    id: LEGACY_CALL_ID.to_owned(),
                    call_type: "function".to_owned(),
                    function,
                }],
            });
        }
        Ok(ChatReply {
            content: message.content,
            tool_calls: Vec::new(),
        })
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> VoiceError {
        let message = extract_error_message(body);
        match status.as_u16() {
            401 => VoiceError::TaskFailure(format!("authentication failed: {message}")),
            429 => VoiceError::TaskFailure(format!("rate limited: {message}")),
            code => VoiceError::TaskFailure(format!("HTTP {code}: {message}")),
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatReply> {
        let body = self.build_body(request);
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VoiceError::Connection(format!(
                        "model request timed out after {}s",
                        self.config.timeout_secs
                    ))
                } else {
                    VoiceError::Connection(format!("model request failed: {e}"))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VoiceError::Connection(format!("reading model response: {e}")))?;
        if !status.is_success() {
            return Err(Self::map_http_error(status, &text));
        }
        Self::parse_reply(&text, self.config.legacy_function_calls)
    }
}

#[async_trait]
impl ChatModel for DashScopeChatClient {
    async fn complete(&self, request: ChatRequest, cancel: CancellationToken) -> Result<ChatReply> {
        info!(model = %self.config.model, tools = request.tools.len(), "sending model request");
        tokio::select! {
            () = cancel.cancelled() => Err(VoiceError::TaskFailure("model request cancelled".to_owned())),
            reply = self.send(&request) => reply,
        }
    }
}

/// Extract an error message from an OpenAI-style error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or_else(|| e.as_str().map(|_| e)))
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::credentials::StaticCredentialSource;

    fn client() -> DashScopeChatClient {
        DashScopeChatClient::with_api_key(LlmConfig::default(), "sk-test").unwrap()
    }

    #[test]
    fn missing_key_is_validation_error() {
        match DashScopeChatClient::new(LlmConfig::default(), &StaticCredentialSource::new()) {
            Err(VoiceError::Validation(msg)) => assert!(msg.contains("DASHSCOPE_API_KEY")),
            other => unreachable!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn body_includes_tools_and_policy() {
        let request = ChatRequest {
            system_prompt: "sys".into(),
            user_text: "turn it red".into(),
            tools: vec![json!({"type": "function", "function": {"name": "F"}})],
            parallel_tool_calls: true,
        };
        let body = client().build_body(&request);
        assert_eq!(body["model"], "qwen-turbo");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "turn it red");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["parallel_tool_calls"], true);
        assert_eq!(body["tools"][0]["function"]["name"], "F");
    }

    #[test]
    fn body_without_tools_omits_tool_fields() {
        let body = client().build_body(&ChatRequest::default());
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn parses_tool_calls() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null,
            "tool_calls":[{"id":"c1","type":"function","function":{"name":"F","arguments":"{}"}}]}}]}"#;
        let reply = DashScopeChatClient::parse_reply(body, true).unwrap();
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].id, "c1");
    }

    #[test]
    fn legacy_function_call_becomes_tool_call() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"",
            "function_call":{"name":"SetTimeOfDay","arguments":"{\"timeOfDay\":6}"}}}]}"#;
        let reply = DashScopeChatClient::parse_reply(body, true).unwrap();
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].id, LEGACY_CALL_ID);
        assert_eq!(reply.tool_calls[0].function.name, "SetTimeOfDay");

        let disabled = DashScopeChatClient::parse_reply(body, false).unwrap();
        assert!(disabled.tool_calls.is_empty());
    }

    #[test]
    fn text_reply_and_bad_bodies() {
        let reply = DashScopeChatClient::parse_reply(
            r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#,
            true,
        )
        .unwrap();
        assert_eq!(reply.content.as_deref(), Some("hello"));
        assert!(!reply.has_tool_calls());

        assert!(matches!(
            DashScopeChatClient::parse_reply(r#"{"choices":[]}"#, true),
            Err(VoiceError::Protocol(_))
        ));
        assert!(matches!(
            DashScopeChatClient::parse_reply("<html>", true),
            Err(VoiceError::Protocol(_))
        ));
    }

    #[test]
    fn http_errors_map_to_task_failure() {
        let err = DashScopeChatClient::map_http_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"bad model"}}"#,
        );
        assert_eq!(err.to_string(), "task failed: HTTP 400: bad model");

        let err = DashScopeChatClient::map_http_error(reqwest::StatusCode::UNAUTHORIZED, "nope");
        assert!(err.to_string().contains("authentication failed: nope"));
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", client());
        assert!(!rendered.contains("sk-test"));
    }
}
