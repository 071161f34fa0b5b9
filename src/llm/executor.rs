//! Tool-call execution and the single-turn model runner.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::client::ChatModel;
use super::types::{ChatRequest, LlmResult, ToolCall};
use crate::config::LlmConfig;
use crate::error::{Result, VoiceError};
use crate::functions::FunctionRegistry;

/// Shown when the model replies with neither text nor tool calls.
pub const EMPTY_REPLY: &str = "The model returned an empty response.";

/// Resolves tool calls against the registry and formats a report.
#[derive(Debug, Clone)]
pub struct ToolCallExecutor {
    registry: Arc<FunctionRegistry>,
    parallel: bool,
    pause: Duration,
}

impl ToolCallExecutor {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            parallel: true,
            pause: Duration::from_millis(100),
        }
    }

    pub fn from_config(registry: Arc<FunctionRegistry>, config: &LlmConfig) -> Self {
        Self::new(registry)
            .with_parallel(config.parallel_tool_calls)
            .with_pause(config.sequential_pause())
    }

    /// Run multiple calls concurrently when more than one is present.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Pause after each call in sequential mode.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Execute one call.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Dispatch`] for a non-function call type, an
    /// unknown function, or malformed arguments; otherwise whatever the
    /// handler returns.
    pub fn execute_one(&self, call: &ToolCall) -> Result<String> {
        if call.call_type != "function" {
            return Err(VoiceError::Dispatch(format!(
                "unsupported tool type: {}",
                call.call_type
            )));
        }
        debug!(id = %call.id, function = %call.function.name, "executing tool call");
        self.registry
            .execute_json(&call.function.name, &call.function.arguments)
    }

    /// Execute one call on the blocking pool. A panicking handler becomes a
    /// [`VoiceError::Dispatch`] for that call only.
    async fn execute_isolated(&self, call: ToolCall) -> (String, Result<String>) {
        let executor = self.clone();
        let id = call.id.clone();
        let outcome = match tokio::task::spawn_blocking(move || executor.execute_one(&call)).await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                error!(id = %id, error = %join_err, "tool call panicked");
                Err(VoiceError::Dispatch(format!("tool call {id} panicked")))
            }
        };
        (id, outcome)
    }

    /// Execute every call and return the formatted report.
    ///
    /// A failing or panicking call never prevents the others from running.
    /// In sequential mode, cancellation stops before the next call.
    pub async fn execute(&self, calls: &[ToolCall], cancel: &CancellationToken) -> String {
        let mut results = Vec::new();
        let mut errors = Vec::new();

        if self.parallel && calls.len() > 1 {
            info!(count = calls.len(), "executing tool calls in parallel");
            let mut tasks = JoinSet::new();
            for call in calls {
                let executor = self.clone();
                let call = call.clone();
                tasks.spawn(async move { executor.execute_isolated(call).await });
            }
            // Completion order.
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((id, outcome)) => record(&id, outcome, &mut results, &mut errors),
                    Err(e) => error!(error = %e, "tool call task aborted"),
                }
            }
        } else {
            info!(count = calls.len(), "executing tool calls sequentially");
            for call in calls {
                if cancel.is_cancelled() {
                    info!("tool execution cancelled");
                    break;
                }
                let (id, outcome) = self.execute_isolated(call.clone()).await;
                record(&id, outcome, &mut results, &mut errors);
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("tool execution cancelled");
                        break;
                    }
                    () = tokio::time::sleep(self.pause) => {}
                }
            }
        }

        format_report(&results, &errors)
    }
}

fn record(id: &str, outcome: Result<String>, results: &mut Vec<String>, errors: &mut Vec<String>) {
    match outcome {
        Ok(result) => results.push(result),
        Err(e) => {
            error!(id = %id, error = %e, "tool call failed");
            errors.push(format!("tool call {id} failed: {e}"));
        }
    }
}

/// Successes under `Executed N operation(s):`, then a blank line, then
/// failures under `N error(s):`. Trimmed.
pub fn format_report(results: &[String], errors: &[String]) -> String {
    let mut out = String::new();
    if !results.is_empty() {
        out.push_str(&format!("Executed {} operation(s):\n", results.len()));
        for r in results {
            out.push_str(&format!("✓ {r}\n"));
        }
    }
    if !errors.is_empty() {
        if !results.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("{} error(s):\n", errors.len()));
        for e in errors {
            out.push_str(&format!("✗ {e}\n"));
        }
    }
    out.trim().to_owned()
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Sends recognized text to the model and executes whatever tools it asks for.
pub struct LlmAssistant {
    model: Arc<dyn ChatModel>,
    registry: Arc<FunctionRegistry>,
    executor: ToolCallExecutor,
    config: LlmConfig,
}

impl LlmAssistant {
    pub fn new(model: Arc<dyn ChatModel>, registry: Arc<FunctionRegistry>, config: LlmConfig) -> Self {
        let executor = ToolCallExecutor::from_config(Arc::clone(&registry), &config);
        Self {
            model,
            registry,
            executor,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Process one utterance. Returns `Ok(None)` when cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Validation`] for blank text; otherwise
    /// propagates model request failures.
    pub async fn process(&self, text: &str, cancel: CancellationToken) -> Result<Option<LlmResult>> {
        if text.trim().is_empty() {
            return Err(VoiceError::Validation("command text is empty".into()));
        }
        let request = ChatRequest {
            system_prompt: self.config.system_prompt.clone(),
            user_text: text.to_owned(),
            tools: self.registry.schemas_for_api(),
            parallel_tool_calls: self.config.parallel_tool_calls,
        };

        let reply = match self.model.complete(request, cancel.clone()).await {
            Ok(reply) => reply,
            Err(_) if cancel.is_cancelled() => return Ok(None),
            Err(e) => return Err(e),
        };
        if cancel.is_cancelled() {
            return Ok(None);
        }

        if reply.has_tool_calls() {
            let report = self.executor.execute(&reply.tool_calls, &cancel).await;
            if cancel.is_cancelled() {
                return Ok(None);
            }
            return Ok(Some(LlmResult::success(report, true)));
        }

        let content = reply
            .content
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_owned());
        Ok(Some(LlmResult::success(content, false)))
    }
}

impl std::fmt::Debug for LlmAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAssistant")
            .field("model", &self.config.model)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::functions::FunctionMeta;
    use crate::llm::types::ChatReply;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn registry() -> Arc<FunctionRegistry> {
        let registry = FunctionRegistry::new();
        registry.register(FunctionMeta::new("SetTimeOfDay", "Set time", |args| {
            Ok(format!("time set to {}", args.number("timeOfDay")?))
        }));
        registry.register(FunctionMeta::new("Fail", "Always fails", |_| {
            Err(VoiceError::Dispatch("boom".into()))
        }));
        Arc::new(registry)
    }

    fn calls() -> Vec<ToolCall> {
        vec![
            ToolCall::function("a", "SetTimeOfDay", r#"{"timeOfDay":8}"#),
            ToolCall::function("b", "Fail", "{}"),
            ToolCall::function("c", "Missing", "{}"),
            ToolCall::function("d", "SetTimeOfDay", r#"{"timeOfDay":20}"#),
        ]
    }

    #[tokio::test]
    async fn sequential_isolates_failures_in_order() {
        let executor = ToolCallExecutor::new(registry())
            .with_parallel(false)
            .with_pause(Duration::ZERO);
        let report = executor.execute(&calls(), &CancellationToken::new()).await;
        assert_eq!(
            report,
            "Executed 2 operation(s):\n✓ time set to 8\n✓ time set to 20\n\n\
             2 error(s):\n✗ tool call b failed: dispatch error: boom\n\
             ✗ tool call c failed: dispatch error: unregistered function: Missing"
        );
    }

    #[tokio::test]
    async fn parallel_isolates_failures() {
        let executor = ToolCallExecutor::new(registry()).with_parallel(true);
        let report = executor.execute(&calls(), &CancellationToken::new()).await;
        assert!(report.starts_with("Executed 2 operation(s):"));
        assert!(report.contains("✓ time set to 8"));
        assert!(report.contains("✓ time set to 20"));
        assert!(report.contains("2 error(s):"));
        assert!(report.contains("✗ tool call c failed"));
    }

    #[tokio::test]
    async fn panicking_handler_does_not_lose_siblings() {
        let registry = FunctionRegistry::new();
        registry.register(FunctionMeta::new("Boom", "Panics", |_| panic!("handler bug")));
        registry.register(FunctionMeta::new("Fine", "Succeeds", |_| Ok("fine".to_owned())));
        let registry = Arc::new(registry);
        let calls = vec![
            ToolCall::function("1", "Boom", "{}"),
            ToolCall::function("2", "Fine", "{}"),
        ];

        for parallel in [true, false] {
            let executor = ToolCallExecutor::new(Arc::clone(&registry))
                .with_parallel(parallel)
                .with_pause(Duration::ZERO);
            let report = executor.execute(&calls, &CancellationToken::new()).await;
            assert!(report.contains("✓ fine"), "{report}");
            assert!(
                report.contains("✗ tool call 1 failed: dispatch error: tool call 1 panicked"),
                "{report}"
            );
        }
    }

    #[tokio::test]
    async fn sequential_stops_on_cancellation() {
        let executor = ToolCallExecutor::new(registry()).with_parallel(false);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = executor.execute(&calls(), &cancel).await;
        assert_eq!(report, "");
    }

    #[tokio::test]
    async fn non_function_type_is_rejected() {
        let executor = ToolCallExecutor::new(registry()).with_parallel(false);
        let mut call = ToolCall::function("x", "SetTimeOfDay", "{}");
        call.call_type = "retrieval".into();
        let report = executor.execute(&[call], &CancellationToken::new()).await;
        assert_eq!(
            report,
            "1 error(s):\n✗ tool call x failed: dispatch error: unsupported tool type: retrieval"
        );
    }

    #[test]
    fn report_with_only_successes() {
        assert_eq!(
            format_report(&["ok".to_owned()], &[]),
            "Executed 1 operation(s):\n✓ ok"
        );
        assert_eq!(format_report(&[], &[]), "");
    }

    struct CannedModel {
        reply: Mutex<Option<Result<ChatReply>>>,
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, _request: ChatRequest, _cancel: CancellationToken) -> Result<ChatReply> {
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(VoiceError::Protocol("no canned reply".into())))
        }
    }

    fn assistant(reply: Result<ChatReply>) -> LlmAssistant {
        let model = Arc::new(CannedModel {
            reply: Mutex::new(Some(reply)),
        });
        let mut config = LlmConfig::default();
        config.sequential_pause_ms = 0;
        LlmAssistant::new(model, registry(), config)
    }

    #[tokio::test]
    async fn assistant_runs_tool_calls() {
        let reply = ChatReply {
            content: None,
            tool_calls: vec![ToolCall::function("a", "SetTimeOfDay", r#"{"timeOfDay":7}"#)],
        };
        let result = assistant(Ok(reply))
            .process("morning", CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert!(result.has_tool_call);
        assert_eq!(result.response, "Executed 1 operation(s):\n✓ time set to 7");
    }

    #[tokio::test]
    async fn assistant_returns_text_reply() {
        let reply = ChatReply {
            content: Some("I can't do that.".into()),
            tool_calls: Vec::new(),
        };
        let result = assistant(Ok(reply))
            .process("sing", CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert!(!result.has_tool_call);
        assert_eq!(result.response, "I can't do that.");

        let empty = assistant(Ok(ChatReply::default()))
            .process("?", CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(empty.response, EMPTY_REPLY);
    }

    #[tokio::test]
    async fn assistant_rejects_blank_text_without_calling_model() {
        let reply = ChatReply {
            content: Some("should not be used".into()),
            tool_calls: Vec::new(),
        };
        let assistant = assistant(Ok(reply));
        match assistant.process("   ", CancellationToken::new()).await {
            Err(VoiceError::Validation(msg)) => assert_eq!(msg, "command text is empty"),
            other => unreachable!("expected validation error, got {other:?}"),
        }
        let result = assistant
            .process("sing", CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.response, "should not be used");
    }

    #[tokio::test]
    async fn assistant_cancelled_returns_none() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = assistant(Err(VoiceError::TaskFailure("model request cancelled".into())))
            .process("x", cancel)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn assistant_propagates_errors() {
        match assistant(Err(VoiceError::Connection("down".into())))
            .process("x", CancellationToken::new())
            .await
        {
            Err(VoiceError::Connection(msg)) => assert_eq!(msg, "down"),
            other => unreachable!("expected connection error, got {other:?}"),
        }
    }
}
