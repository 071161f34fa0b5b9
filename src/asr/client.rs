//! Streaming recognition client.
//!
//! One [`RecognitionClient::start`] spawns one task that runs
//! connect → `run-task` → stream audio → `finish-task` → final result, with a
//! timeout per phase. Progress is reported as [`RecognitionEvent`]s; the last
//! event of every task is [`RecognitionEvent::Ended`].
//!
//! Teardown (close transport, clear ring buffer, release the active slot)
//! runs on every exit path, including cancellation via
//! [`RecognitionClient::stop`], which waits for it to complete.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::protocol::{ClientMessage, Sentence, ServerEvent, ServerMessage, encode_pcm16};
use super::silence::SilenceDetector;
use super::transport::{Transport, TransportConnection, TransportFrame, TungsteniteTransport};
use crate::audio::SampleRingBuffer;
use crate::config::AsrConfig;
use crate::credentials::{self, CredentialSource, EnvCredentialSource};
use crate::error::{Result, VoiceError};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle phase of the current (or last) task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Connecting,
    Started,
    Streaming,
    Finishing,
    Finished,
    Failed,
}

/// How a task ended.
#[derive(Debug)]
pub enum RecognitionOutcome {
    /// The server acknowledged `finish-task`. Carries the last recognized text.
    Finished { transcript: String },
    Failed(VoiceError),
    Cancelled,
}

/// Progress reported by a running task.
#[derive(Debug)]
pub enum RecognitionEvent {
    /// The server accepted `run-task`.
    Started { task_id: String },
    /// A partial or final sentence with non-empty text.
    Transcript(Sentence),
    /// Local silence detection ended streaming.
    SilenceTimeout,
    /// The recording cap ended streaming.
    MaxDurationReached,
    /// Terminal event.
    Ended(RecognitionOutcome),
}

/// The orchestrator's view of a recognition backend.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Begin a task, reporting progress on `events`.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Validation`] when a task is already active or
    /// a credential is missing.
    async fn start(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<()>;

    /// Cancel the current task, if any, and wait for its teardown.
    async fn stop(&self);
}

struct ActiveTask {
    task_id: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Client for the realtime recognition service.
pub struct RecognitionClient {
    config: AsrConfig,
    sample_rate: u32,
    ring: Arc<SampleRingBuffer>,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialSource>,
    active: Arc<AtomicBool>,
    state: Arc<Mutex<TaskState>>,
    current: Mutex<Option<ActiveTask>>,
}

impl RecognitionClient {
    /// Create a client reading audio from `ring`, using the WebSocket transport
    /// and environment credentials.
    pub fn new(config: AsrConfig, sample_rate: u32, ring: Arc<SampleRingBuffer>) -> Self {
        Self {
            config,
            sample_rate,
            ring,
            transport: Arc::new(TungsteniteTransport),
            credentials: Arc::new(EnvCredentialSource),
            active: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(TaskState::Idle)),
            current: Mutex::new(None),
        }
    }

    /// Replace the transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replace the credential source.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Current task phase.
    pub fn state(&self) -> TaskState {
        *lock(&self.state)
    }

    /// Whether a task is running (including its teardown).
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Id of the most recently started task.
    pub fn task_id(&self) -> Option<String> {
        lock(&self.current).as_ref().map(|t| t.task_id.clone())
    }

    /// Start a task. See [`Recognizer::start`].
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Validation`] when a task is active or the API key
    /// is missing.
    pub fn start_task(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<String> {
        let api_key = credentials::require(self.credentials.as_ref(), &self.config.api_key_env)?;

        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(VoiceError::Validation(
                "a recognition task is already active".to_owned(),
            ));
        }

        let task_id = uuid::Uuid::new_v4().simple().to_string();
        let cancel = CancellationToken::new();
        set_state(&self.state, TaskState::Connecting);

        let ctx = TaskContext {
            task_id: task_id.clone(),
            config: self.config.clone(),
            sample_rate: self.sample_rate,
            api_key,
            transport: Arc::clone(&self.transport),
            ring: Arc::clone(&self.ring),
            events,
            state: Arc::clone(&self.state),
            active: Arc::clone(&self.active),
            start_index: self.ring.total_written(),
        };
        info!(task_id = %task_id, start_index = ctx.start_index, "starting recognition task");

        let handle = tokio::spawn(run_task(ctx, cancel.clone()));
        *lock(&self.current) = Some(ActiveTask {
            task_id: task_id.clone(),
            cancel,
            handle,
        });
        Ok(task_id)
    }

    /// Cancel the current task and wait for its teardown.
    pub async fn stop_task(&self) {
        let task = lock(&self.current).take();
        let Some(task) = task else {
            return;
        };
        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            error!(task_id = %task.task_id, error = %e, "recognition task panicked");
            self.active.store(false, Ordering::SeqCst);
            self.ring.clear();
            set_state(&self.state, TaskState::Failed);
        }
        debug!(task_id = %task.task_id, "recognition task stopped");
    }
}

#[async_trait]
impl Recognizer for RecognitionClient {
    async fn start(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<()> {
        self.start_task(events).map(|_| ())
    }

    async fn stop(&self) {
        self.stop_task().await;
    }
}

impl std::fmt::Debug for RecognitionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionClient")
            .field("url", &self.config.url)
            .field("model", &self.config.model)
            .field("state", &self.state())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(p) => p.into_inner(),
    }
}

fn set_state(state: &Mutex<TaskState>, next: TaskState) {
    *lock(state) = next;
}

// ---------------------------------------------------------------------------
// Task body
// ---------------------------------------------------------------------------

struct TaskContext {
    task_id: String,
    config: AsrConfig,
    sample_rate: u32,
    api_key: String,
    transport: Arc<dyn Transport>,
    ring: Arc<SampleRingBuffer>,
    events: mpsc::UnboundedSender<RecognitionEvent>,
    state: Arc<Mutex<TaskState>>,
    active: Arc<AtomicBool>,
    start_index: u64,
}

impl TaskContext {
    fn emit(&self, event: RecognitionEvent) {
        // A dropped receiver means the orchestrator moved on.
        let _ = self.events.send(event);
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(
            "Authorization".to_owned(),
            format!("Bearer {}", self.api_key),
        )];
        if self.config.data_inspection {
            headers.push((
                "X-DashScope-DataInspection".to_owned(),
                "enable".to_owned(),
            ));
        }
        headers
    }
}

/// Results accumulated from server messages.
#[derive(Default)]
struct ResultTracker {
    transcript: String,
    /// A speech-final sentence arrived.
    end_requested: bool,
    /// `task-finished` arrived.
    server_finished: bool,
}

impl ResultTracker {
    /// Interpret one inbound frame. `None` means the frame channel closed.
    fn handle_frame(
        &mut self,
        ctx: &TaskContext,
        frame: Option<TransportFrame>,
    ) -> Result<Option<ServerEvent>> {
        let text = match frame {
            Some(TransportFrame::Text(text)) => text,
            Some(TransportFrame::Binary(data)) => {
                debug!(task_id = %ctx.task_id, bytes = data.len(), "ignoring binary frame");
                return Ok(None);
            }
            Some(TransportFrame::Closed) | None => {
                return Err(VoiceError::Connection(
                    "connection closed by server".to_owned(),
                ));
            }
            Some(TransportFrame::Error(e)) => {
                return Err(VoiceError::Connection(format!("read error: {e}")));
            }
        };

        let msg = ServerMessage::parse(&text).inspect_err(|e| {
            error!(task_id = %ctx.task_id, error = %e, "malformed server message");
        })?;
        if let Some(id) = msg.header.task_id.as_deref()
            && id != ctx.task_id
        {
            debug!(task_id = %ctx.task_id, other = %id, "message for another task id");
        }

        let event = msg.event();
        match &event {
            ServerEvent::TaskStarted => {
                info!(task_id = %ctx.task_id, "recognition task started");
            }
            ServerEvent::ResultGenerated => self.accept_sentence(ctx, &msg),
            ServerEvent::TaskFinished => {
                self.accept_sentence(ctx, &msg);
                self.server_finished = true;
                info!(task_id = %ctx.task_id, "recognition task finished");
            }
            ServerEvent::TaskFailed => {
                let message = msg.failure_message();
                error!(task_id = %ctx.task_id, status = ?msg.header.status_code, error = %message, "recognition task failed");
                return Err(VoiceError::TaskFailure(message));
            }
            ServerEvent::Other(name) => {
                debug!(task_id = %ctx.task_id, event = %name, "ignoring unknown event");
                return Ok(None);
            }
        }
        Ok(Some(event))
    }

    fn accept_sentence(&mut self, ctx: &TaskContext, msg: &ServerMessage) {
        let Some(sentence) = msg.sentence() else {
            return;
        };
        if !sentence.text.is_empty() {
            debug!(task_id = %ctx.task_id, text = %sentence.text, final_ = sentence.is_speech_final(), "recognition result");
            self.transcript.clone_from(&sentence.text);
            ctx.emit(RecognitionEvent::Transcript(sentence.clone()));
        }
        if sentence.is_speech_final() {
            self.end_requested = true;
        }
    }
}

async fn run_task(ctx: TaskContext, cancel: CancellationToken) {
    let mut conn: Option<TransportConnection> = None;

    let outcome = tokio::select! {
        () = cancel.cancelled() => RecognitionOutcome::Cancelled,
        result = drive(&ctx, &mut conn) => match result {
            Ok(transcript) => RecognitionOutcome::Finished { transcript },
            Err(e) => RecognitionOutcome::Failed(e),
        },
    };

    // Teardown.
    if let Some(mut conn) = conn.take() {
        match tokio::time::timeout(CLOSE_TIMEOUT, conn.sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(task_id = %ctx.task_id, error = %e, "transport close failed"),
            Err(_) => debug!(task_id = %ctx.task_id, "transport close timed out"),
        }
    }
    ctx.ring.clear();
    let final_state = match &outcome {
        RecognitionOutcome::Finished { .. } => TaskState::Finished,
        RecognitionOutcome::Failed(_) => TaskState::Failed,
        RecognitionOutcome::Cancelled => TaskState::Idle,
    };
    set_state(&ctx.state, final_state);
    ctx.active.store(false, Ordering::SeqCst);

    match &outcome {
        RecognitionOutcome::Finished { transcript } => {
            info!(task_id = %ctx.task_id, transcript = %transcript, "recognition complete");
        }
        RecognitionOutcome::Failed(e) => {
            warn!(task_id = %ctx.task_id, error = %e, "recognition failed");
        }
        RecognitionOutcome::Cancelled => {
            info!(task_id = %ctx.task_id, "recognition cancelled");
        }
    }
    ctx.emit(RecognitionEvent::Ended(outcome));
}

async fn drive(ctx: &TaskContext, slot: &mut Option<TransportConnection>) -> Result<String> {
    let cfg = &ctx.config;

    // Connect.
    let opened = tokio::time::timeout(
        cfg.connect_timeout(),
        ctx.transport.open(&cfg.url, &ctx.headers()),
    )
    .await
    .map_err(|_| {
        VoiceError::Connection(format!(
            "connect timed out after {}s",
            cfg.connect_timeout_secs
        ))
    })??;
    let conn = slot.insert(opened);
    debug!(task_id = %ctx.task_id, url = %cfg.url, "transport open");

    // run-task, then wait for task-started.
    let run = ClientMessage::run_task(&ctx.task_id, &cfg.model, ctx.sample_rate, &cfg.parameters);
    conn.sink.send_text(run.to_json()?).await?;

    let mut tracker = ResultTracker::default();
    tokio::time::timeout(cfg.start_timeout(), async {
        loop {
            let frame = conn.frames.recv().await;
            if let Some(ServerEvent::TaskStarted) = tracker.handle_frame(ctx, frame)? {
                return Ok::<(), VoiceError>(());
            }
        }
    })
    .await
    .map_err(|_| {
        VoiceError::Connection(format!(
            "timed out after {}s waiting for task-started",
            cfg.start_timeout_secs
        ))
    })??;
    set_state(&ctx.state, TaskState::Started);
    ctx.emit(RecognitionEvent::Started {
        task_id: ctx.task_id.clone(),
    });

    // Stream.
    set_state(&ctx.state, TaskState::Streaming);
    stream_audio(ctx, conn, &mut tracker).await?;

    // Finish.
    set_state(&ctx.state, TaskState::Finishing);
    if !tracker.server_finished {
        let finish = ClientMessage::finish_task(&ctx.task_id);
        conn.sink.send_text(finish.to_json()?).await?;
        tokio::time::timeout(cfg.finish_timeout(), async {
            while !tracker.server_finished {
                let frame = conn.frames.recv().await;
                tracker.handle_frame(ctx, frame)?;
            }
            Ok::<(), VoiceError>(())
        })
        .await
        .map_err(|_| {
            VoiceError::Connection(format!(
                "timed out after {}s waiting for task-finished",
                cfg.finish_timeout_secs
            ))
        })??;
    }

    Ok(tracker.transcript)
}

async fn stream_audio(
    ctx: &TaskContext,
    conn: &mut TransportConnection,
    tracker: &mut ResultTracker,
) -> Result<()> {
    let cfg = &ctx.config;
    let rate = u64::from(ctx.sample_rate);
    let chunk_size = cfg.chunk_size.max(1);
    let max_samples = (f64::from(cfg.max_recording_secs.max(0.0)) * rate as f64) as u64;
    let idle_samples = cfg.poll_interval_ms * rate / 1000;

    let mut silence =
        SilenceDetector::new(cfg.silence_threshold, cfg.silence_timeout_secs, ctx.sample_rate);
    let mut last = ctx.start_index;
    let mut elapsed: u64 = 0;
    let mut chunks_sent: u64 = 0;

    info!(task_id = %ctx.task_id, "streaming audio");
    loop {
        // Drain inbound messages without blocking.
        loop {
            match conn.frames.try_recv() {
                Ok(frame) => {
                    tracker.handle_frame(ctx, Some(frame))?;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracker.handle_frame(ctx, None)?;
                }
            }
        }
        if tracker.end_requested || tracker.server_finished {
            debug!(task_id = %ctx.task_id, "speech-final result, ending stream");
            break;
        }
        if elapsed >= max_samples {
            info!(task_id = %ctx.task_id, secs = cfg.max_recording_secs, "maximum recording time reached");
            ctx.emit(RecognitionEvent::MaxDurationReached);
            break;
        }

        let (samples, next) = ctx.ring.read_since(last);
        if samples.is_empty() {
            tokio::time::sleep(cfg.poll_interval()).await;
            elapsed += idle_samples;
            continue;
        }
        last = next;

        let mut silent = false;
        for chunk in samples.chunks(chunk_size) {
            if silence.observe(chunk) {
                silent = true;
                break;
            }
            conn.sink.send_binary(encode_pcm16(chunk)).await?;
            elapsed += chunk.len() as u64;
            chunks_sent += 1;
        }
        if silent {
            info!(task_id = %ctx.task_id, secs = cfg.silence_timeout_secs, "silence timeout reached");
            ctx.emit(RecognitionEvent::SilenceTimeout);
            break;
        }
    }
    debug!(task_id = %ctx.task_id, chunks = chunks_sent, elapsed_samples = elapsed, "audio streaming finished");
    Ok(())
}
