//! Chat-completion wire types and the model result handed to the orchestrator.

use serde::{Deserialize, Serialize};

/// The function half of a tool call. `arguments` is a JSON object encoded as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A model-issued request to run a registered function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_owned()
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_owned(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }
}

/// A single-turn request: system prompt, user text, and available tools.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_text: String,
    /// OpenAI-style tool definitions.
    pub tools: Vec<serde_json::Value>,
    pub parallel_tool_calls: bool,
}

/// What the model replied with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatReply {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Outcome of one model round trip, after any tool calls were executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResult {
    /// Execution report when tools ran, otherwise the model's text.
    pub response: String,
    pub is_error: bool,
    pub error_message: Option<String>,
    pub has_tool_call: bool,
}

impl LlmResult {
    pub fn success(response: impl Into<String>, has_tool_call: bool) -> Self {
        Self {
            response: response.into(),
            is_error: false,
            error_message: None,
            has_tool_call,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            response: String::new(),
            is_error: true,
            error_message: Some(message.into()),
            has_tool_call: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Response body
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn tool_call_wire_shape() {
        let call = ToolCall::function("call_1", "SetTimeOfDay", r#"{"timeOfDay":8}"#);
        let v = serde_json::to_value(&call).unwrap();
        assert_eq!(v["type"], "function");
        assert_eq!(v["function"]["name"], "SetTimeOfDay");
        assert_eq!(v["function"]["arguments"], r#"{"timeOfDay":8}"#);
    }

    #[test]
    fn tool_call_type_defaults_to_function() {
        let call: ToolCall =
            serde_json::from_str(r#"{"id":"x","function":{"name":"F","arguments":"{}"}}"#).unwrap();
        assert_eq!(call.call_type, "function");
    }

    #[test]
    fn completion_message_parses_null_content() {
        let msg: CompletionMessage = serde_json::from_str(
            r#"{"role":"assistant","content":null,"tool_calls":[{"id":"a","type":"function","function":{"name":"F","arguments":"{}"}}]}"#,
        )
        .unwrap();
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_calls.unwrap().len(), 1);
    }

    #[test]
    fn result_constructors() {
        let ok = LlmResult::success("done", true);
        assert!(!ok.is_error && ok.has_tool_call);
        let err = LlmResult::error("boom");
        assert!(err.is_error);
        assert_eq!(err.error_message.as_deref(), Some("boom"));
    }
}
