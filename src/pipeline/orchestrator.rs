//! Conversation state machine.
//!
//! ```text
//!            wake                end of speech
//!   Idle ──────────▶ Listening ────────────────▶ Success ──┐
//!    ▲                  │  │                        ▲       │ display timer
//!    │   silence, no    │  │ transcript / no match  │       ▼
//!    └──── speech ──────┘  └──────▶ Processing ─────┴──▶ Invalid ──▶ Idle
//! ```
//!
//! The orchestrator owns all pipeline state and runs on a single task. Work
//! that suspends (recognition, model requests) runs elsewhere and reports back
//! over channels tagged with the epoch of the scope that started it; results
//! from a superseded scope are dropped.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::session::ConversationSession;
use crate::asr::{RecognitionEvent, RecognitionOutcome, Recognizer, Sentence};
use crate::config::{ConversationConfig, VoiceConfig};
use crate::error::Result;
use crate::functions::FunctionRegistry;
use crate::llm::{LlmAssistant, LlmResult};
use crate::nlu::CommandMatcher;
use crate::runtime::RuntimeEvent;

const RUNTIME_CHANNEL_CAPACITY: usize = 64;

/// Conversation phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConversationState {
    Idle,
    Listening,
    Processing,
    Success,
    Invalid,
    Shutdown,
}

/// External requests.
#[derive(Debug, Clone)]
enum Command {
    Wake { keyword: String },
    Shutdown,
}

/// Cloneable handle for driving a running orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl OrchestratorHandle {
    /// Report a detected wake keyword. Returns `false` if the orchestrator has exited.
    pub fn wake(&self, keyword: impl Into<String>) -> bool {
        self.tx
            .send(Command::Wake {
                keyword: keyword.into(),
            })
            .is_ok()
    }

    /// Ask the orchestrator to shut down. Returns `false` if it has already exited.
    pub fn shutdown(&self) -> bool {
        self.tx.send(Command::Shutdown).is_ok()
    }
}

/// One loop iteration's input.
enum Step {
    Command(Option<Command>),
    Recognition(u64, Option<RecognitionEvent>),
    Model(u64, Option<Option<LlmResult>>),
    DisplayElapsed,
}

/// Sequences recognition, local matching, and the model fallback.
pub struct ConversationOrchestrator {
    config: ConversationConfig,
    fast_path: bool,
    recognizer: Arc<dyn Recognizer>,
    assistant: Arc<LlmAssistant>,
    registry: Arc<FunctionRegistry>,
    matcher: Option<CommandMatcher>,
    runtime_tx: broadcast::Sender<RuntimeEvent>,
    commands: mpsc::UnboundedReceiver<Command>,

    state: ConversationState,
    session: ConversationSession,
    epoch: u64,
    recognition: Option<(u64, mpsc::UnboundedReceiver<RecognitionEvent>)>,
    model: Option<(u64, oneshot::Receiver<Option<LlmResult>>)>,
    model_cancel: Option<CancellationToken>,
    display_deadline: Option<Instant>,
}

impl ConversationOrchestrator {
    /// Create an orchestrator and the handle that drives it.
    ///
    /// The local fast path is active when `config.nlu.enabled` and a matcher
    /// is supplied.
    pub fn new(
        config: &VoiceConfig,
        recognizer: Arc<dyn Recognizer>,
        assistant: Arc<LlmAssistant>,
        matcher: Option<CommandMatcher>,
    ) -> (Self, OrchestratorHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let (runtime_tx, _) = broadcast::channel(RUNTIME_CHANNEL_CAPACITY);
        let registry = Arc::clone(assistant.registry());
        let orchestrator = Self {
            config: config.conversation.clone(),
            fast_path: config.nlu.enabled && matcher.is_some(),
            recognizer,
            assistant,
            registry,
            matcher,
            runtime_tx,
            commands,
            state: ConversationState::Idle,
            session: ConversationSession::default(),
            epoch: 0,
            recognition: None,
            model: None,
            model_cancel: None,
            display_deadline: None,
        };
        (orchestrator, OrchestratorHandle { tx })
    }

    /// Attach an existing runtime event broadcaster.
    pub fn with_runtime_events(mut self, tx: broadcast::Sender<RuntimeEvent>) -> Self {
        self.runtime_tx = tx;
        self
    }

    /// Subscribe to runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.runtime_tx.subscribe()
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    /// Drive the state machine until shutdown.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok(())`; the signature leaves room for
    /// fatal setup failures.
    pub async fn run(mut self) -> Result<()> {
        info!(fast_path = self.fast_path, "conversation orchestrator running");
        while self.state != ConversationState::Shutdown {
            let step = tokio::select! {
                cmd = self.commands.recv() => Step::Command(cmd),
                (epoch, ev) = next_recognition(&mut self.recognition) => Step::Recognition(epoch, ev),
                (epoch, res) = next_model(&mut self.model) => Step::Model(epoch, res),
                () = display_elapsed(self.display_deadline) => Step::DisplayElapsed,
            };

            match step {
                Step::Command(Some(Command::Wake { keyword })) => self.on_wake(keyword).await,
                Step::Command(Some(Command::Shutdown) | None) => {
                    self.goto(ConversationState::Shutdown).await;
                }
                Step::Recognition(epoch, ev) => self.on_recognition(epoch, ev).await,
                Step::Model(epoch, res) => self.on_model(epoch, res).await,
                Step::DisplayElapsed => {
                    self.display_deadline = None;
                    self.goto(ConversationState::Idle).await;
                }
            }
        }
        info!("conversation orchestrator stopped");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Event handling
    // -----------------------------------------------------------------------

    async fn on_wake(&mut self, keyword: String) {
        if !matches!(
            self.state,
            ConversationState::Idle | ConversationState::Success | ConversationState::Invalid
        ) {
            debug!(state = ?self.state, keyword = %keyword, "wake ignored");
            return;
        }
        info!(keyword = %keyword, "wake word detected");
        self.session.wake_word = Some(keyword);
        self.session.wake_confidence = self.config.wake_confidence;
        self.goto(ConversationState::Listening).await;
    }

    async fn on_recognition(&mut self, epoch: u64, event: Option<RecognitionEvent>) {
        let Some(event) = event else {
            // Sender dropped; the task is gone.
            self.recognition = None;
            return;
        };
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "dropping stale recognition event");
            return;
        }
        if self.state != ConversationState::Listening {
            debug!(state = ?self.state, event = ?event, "recognition event outside listening");
            return;
        }

        let next = match event {
            RecognitionEvent::Started { task_id } => {
                debug!(task_id = %task_id, "recognition started");
                None
            }
            RecognitionEvent::Transcript(sentence) => self.on_transcript(sentence),
            RecognitionEvent::SilenceTimeout => {
                if !self.session.has_transcript() {
                    info!("silence without speech, returning to idle");
                    Some(ConversationState::Idle)
                } else if self.config.process_on_silence_after_speech {
                    Some(self.end_of_speech())
                } else {
                    Some(ConversationState::Idle)
                }
            }
            RecognitionEvent::MaxDurationReached => Some(ConversationState::Processing),
            RecognitionEvent::Ended(RecognitionOutcome::Finished { transcript }) => {
                if !self.session.has_transcript() && !transcript.trim().is_empty() {
                    self.session.transcript = transcript;
                }
                Some(self.end_of_speech())
            }
            RecognitionEvent::Ended(RecognitionOutcome::Failed(e)) => {
                error!(error = %e, "speech recognition failed");
                self.session.error_info = format!("Speech recognition failed: {}", e.user_message());
                Some(ConversationState::Invalid)
            }
            RecognitionEvent::Ended(RecognitionOutcome::Cancelled) => None,
        };

        if let Some(next) = next {
            self.goto(next).await;
        }
    }

    fn on_transcript(&mut self, sentence: Sentence) -> Option<ConversationState> {
        debug!(text = %sentence.text, "transcript");
        self.session.transcript.clone_from(&sentence.text);
        self.session.last_sentence = Some(sentence.clone());
        let speech_final = sentence.is_speech_final();
        let text = sentence.text.clone();
        self.emit(RuntimeEvent::Transcript(sentence));

        if self.fast_path
            && let Some(matcher) = self.matcher.as_mut()
        {
            let functions: Vec<String> = matcher
                .process_text(&text)
                .iter()
                .map(|c| c.function.clone())
                .collect();
            if !functions.is_empty() {
                self.emit(RuntimeEvent::CommandsMatched { functions });
            }
        }
        self.emit_session();

        speech_final.then(|| self.end_of_speech())
    }

    /// Decide where a finished utterance goes.
    fn end_of_speech(&mut self) -> ConversationState {
        if self.fast_path
            && let Some(matcher) = self.matcher.as_mut()
            && matcher.has_pending()
        {
            let report = matcher.execute_pending(&self.registry);
            info!(report = %report, "executed local commands");
            self.session.result_text = report;
            return ConversationState::Success;
        }
        if self.session.has_transcript() || !self.fast_path {
            return ConversationState::Processing;
        }
        self.session.error_info = self.config.empty_utterance_message.clone();
        ConversationState::Invalid
    }

    async fn on_model(&mut self, epoch: u64, result: Option<Option<LlmResult>>) {
        self.model = None;
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "dropping stale model result");
            return;
        }
        if self.state != ConversationState::Processing {
            debug!(state = ?self.state, "model result outside processing");
            return;
        }
        let Some(result) = result else {
            warn!("model task ended without a result");
            self.session.error_info = "Model processing failed: request aborted".to_owned();
            self.goto(ConversationState::Invalid).await;
            return;
        };
        let Some(result) = result else {
            debug!("model request cancelled");
            return;
        };

        let next = if result.is_error {
            self.session.error_info = format!(
                "Model processing failed: {}",
                result.error_message.as_deref().unwrap_or_default()
            );
            ConversationState::Invalid
        } else if !result.has_tool_call {
            self.session.error_info = result.response;
            ConversationState::Invalid
        } else {
            self.session.result_text = result.response;
            ConversationState::Success
        };
        self.goto(next).await;
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Transition, following any state an entry action chains into.
    async fn goto(&mut self, to: ConversationState) {
        let mut next = Some(to);
        while let Some(to) = next {
            next = self.enter(to).await;
        }
    }

    async fn enter(&mut self, to: ConversationState) -> Option<ConversationState> {
        if to == self.state {
            return None;
        }
        let from = self.state;
        self.state = to;
        info!(from = ?from, to = ?to, "conversation state changed");
        self.emit(RuntimeEvent::StateChanged { from, to });

        let mut follow_up = None;
        match to {
            ConversationState::Idle => {
                self.display_deadline = None;
                self.session.clear();
                self.clear_matcher();
                self.stop_recognition().await;
                self.cancel_model();
            }
            ConversationState::Listening => {
                self.display_deadline = None;
                self.session.clear_main_info();
                self.clear_matcher();
                self.cancel_model();
                follow_up = self.start_recognition().await;
            }
            ConversationState::Processing => {
                self.display_deadline = None;
                self.stop_recognition().await;
                self.start_model_request();
            }
            ConversationState::Success | ConversationState::Invalid => {
                self.stop_recognition().await;
                self.cancel_model();
                self.display_deadline = Some(Instant::now() + self.config.result_display());
            }
            ConversationState::Shutdown => {
                self.display_deadline = None;
                self.stop_recognition().await;
                self.cancel_model();
            }
        }
        self.emit_session();
        follow_up
    }

    async fn start_recognition(&mut self) -> Option<ConversationState> {
        self.epoch += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        match self.recognizer.start(tx).await {
            Ok(()) => {
                self.recognition = Some((self.epoch, rx));
                None
            }
            Err(e) => {
                error!(error = %e, "could not start recognition");
                self.session.error_info =
                    format!("Speech recognition failed: {}", e.user_message());
                Some(ConversationState::Invalid)
            }
        }
    }

    async fn stop_recognition(&mut self) {
        self.recognition = None;
        self.recognizer.stop().await;
    }

    fn start_model_request(&mut self) {
        self.cancel_model();
        self.epoch += 1;
        let epoch = self.epoch;
        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let assistant = Arc::clone(&self.assistant);
        let text = self.session.transcript.clone();
        let token = cancel.clone();

        info!(epoch, text = %text, "sending utterance to model");
        tokio::spawn(async move {
            let outcome = match assistant.process(&text, token).await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "model request failed");
                    Some(LlmResult::error(e.user_message()))
                }
            };
            let _ = tx.send(outcome);
        });

        self.model = Some((epoch, rx));
        self.model_cancel = Some(cancel);
    }

    fn cancel_model(&mut self) {
        if let Some(cancel) = self.model_cancel.take() {
            cancel.cancel();
        }
        self.model = None;
    }

    fn clear_matcher(&mut self) {
        if let Some(matcher) = self.matcher.as_mut() {
            matcher.clear();
        }
    }

    fn emit(&self, event: RuntimeEvent) {
        // No subscribers is fine.
        let _ = self.runtime_tx.send(event);
    }

    fn emit_session(&self) {
        self.emit(RuntimeEvent::SessionUpdated(self.session.clone()));
    }
}

impl std::fmt::Debug for ConversationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationOrchestrator")
            .field("state", &self.state)
            .field("epoch", &self.epoch)
            .field("fast_path", &self.fast_path)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Optional select branches
// ---------------------------------------------------------------------------

async fn next_recognition(
    slot: &mut Option<(u64, mpsc::UnboundedReceiver<RecognitionEvent>)>,
) -> (u64, Option<RecognitionEvent>) {
    match slot {
        Some((epoch, rx)) => (*epoch, rx.recv().await),
        None => std::future::pending().await,
    }
}

async fn next_model(
    slot: &mut Option<(u64, oneshot::Receiver<Option<LlmResult>>)>,
) -> (u64, Option<Option<LlmResult>>) {
    match slot {
        Some((epoch, rx)) => (*epoch, rx.await.ok()),
        None => std::future::pending().await,
    }
}

async fn display_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
