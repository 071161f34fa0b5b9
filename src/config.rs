//! Configuration types for the voice-command pipeline.

use crate::error::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Audio buffering settings.
    pub audio: AudioConfig,
    /// Streaming speech recognition settings.
    pub asr: AsrConfig,
    /// Local keyword matcher settings.
    pub nlu: NluConfig,
    /// Remote language model settings.
    pub llm: LlmConfig,
    /// Conversation state machine settings.
    pub conversation: ConversationConfig,
}

/// Audio buffering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the acquisition stream in Hz.
    pub sample_rate: u32,
    /// Ring buffer retention in seconds.
    pub buffer_seconds: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            buffer_seconds: 10,
        }
    }
}

impl AudioConfig {
    /// Ring buffer capacity in samples.
    pub fn buffer_capacity(&self) -> usize {
        self.sample_rate as usize * self.buffer_seconds as usize
    }
}

/// Recognition languages accepted by the realtime model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageHint {
    /// Mandarin and most Chinese dialects.
    Zh,
    /// English.
    En,
    /// Japanese.
    Ja,
    /// Cantonese.
    Yue,
    /// Korean.
    Ko,
    /// German.
    De,
    /// French.
    Fr,
    /// Russian.
    Ru,
}

/// Server-side recognition toggles sent with `run-task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionParameters {
    /// Custom hot-word vocabulary id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocabulary_id: Option<String>,
    /// Expected languages (empty = auto).
    pub language_hints: Vec<LanguageHint>,
    /// Semantic sentence segmentation instead of VAD segmentation.
    pub semantic_punctuation_enabled: bool,
    /// Keeps VAD from cutting long sentences. Ignored with semantic punctuation.
    pub multi_threshold_mode_enabled: bool,
    /// VAD silence threshold in milliseconds (200..=6000).
    pub max_sentence_silence: u32,
    /// Filter filler words.
    pub disfluency_removal_enabled: bool,
    /// Add punctuation to results.
    pub punctuation_prediction_enabled: bool,
    /// Keep the connection alive during long silences.
    pub heartbeat: bool,
    /// Convert spoken numbers to Arabic numerals.
    pub inverse_text_normalization_enabled: bool,
}

impl Default for RecognitionParameters {
    fn default() -> Self {
        Self {
            vocabulary_id: None,
            language_hints: Vec::new(),
            semantic_punctuation_enabled: false,
            multi_threshold_mode_enabled: false,
            max_sentence_silence: 800,
            disfluency_removal_enabled: true,
            punctuation_prediction_enabled: true,
            heartbeat: false,
            inverse_text_normalization_enabled: true,
        }
    }
}

/// Streaming recognition client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Recognition model name.
    pub model: String,
    /// Name of the credential holding the API key.
    pub api_key_env: String,
    /// Send the `X-DashScope-DataInspection: enable` header.
    pub data_inspection: bool,
    /// Samples per binary audio frame.
    pub chunk_size: usize,
    /// Peak magnitude at or below which a chunk counts as silent.
    pub silence_threshold: f32,
    /// Continuous silence that ends streaming, in seconds.
    pub silence_timeout_secs: f32,
    /// Maximum audio streamed per task, in seconds.
    pub max_recording_secs: f32,
    /// Wait between ring buffer polls when no audio is pending.
    pub poll_interval_ms: u64,
    /// Transport open timeout.
    pub connect_timeout_secs: u64,
    /// Wait for `task-started`.
    pub start_timeout_secs: u64,
    /// Wait for `task-finished` / `task-failed` after `finish-task`.
    pub finish_timeout_secs: u64,
    /// Server-side recognition toggles.
    pub parameters: RecognitionParameters,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            url: "wss://dashscope.aliyuncs.com/api-ws/v1/inference/".to_owned(),
            model: "paraformer-realtime-v2".to_owned(),
            api_key_env: "DASHSCOPE_API_KEY".to_owned(),
            data_inspection: true,
            chunk_size: 1024,
            silence_threshold: 0.003,
            silence_timeout_secs: 2.0,
            max_recording_secs: 20.0,
            poll_interval_ms: 50,
            connect_timeout_secs: 10,
            start_timeout_secs: 10,
            finish_timeout_secs: 30,
            parameters: RecognitionParameters::default(),
        }
    }
}

impl AsrConfig {
    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `task-started` timeout as a [`Duration`].
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    /// `task-finished` timeout as a [`Duration`].
    pub fn finish_timeout(&self) -> Duration {
        Duration::from_secs(self.finish_timeout_secs)
    }
}

/// Local keyword matcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NluConfig {
    /// Try the local matcher before falling back to the remote model.
    pub enabled: bool,
    /// Maximum complete commands kept per utterance.
    pub command_limit: usize,
    /// JSON function catalog (synonyms and enum keywords).
    pub catalog_path: Option<PathBuf>,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command_limit: 2,
            catalog_path: None,
        }
    }
}

/// Remote language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (including `/v1`).
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Name of the credential holding the API key.
    pub api_key_env: String,
    /// System prompt sent with every request.
    pub system_prompt: String,
    /// Overall request timeout.
    pub timeout_secs: u64,
    /// Ask the model for parallel tool calls and execute them concurrently.
    pub parallel_tool_calls: bool,
    /// Accept the deprecated single `function_call` reply shape.
    pub legacy_function_calls: bool,
    /// Pause after each call in sequential mode.
    pub sequential_pause_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_owned(),
            model: "qwen-turbo".to_owned(),
            api_key_env: "DASHSCOPE_API_KEY".to_owned(),
            system_prompt: "You are an assistant that controls objects in a 3D scene. \
                            Use the provided tools to carry out the user's request."
                .to_owned(),
            timeout_secs: 30,
            parallel_tool_calls: true,
            legacy_function_calls: true,
            sequential_pause_ms: 100,
        }
    }
}

impl LlmConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Sequential-mode pause as a [`Duration`].
    pub fn sequential_pause(&self) -> Duration {
        Duration::from_millis(self.sequential_pause_ms)
    }
}

/// Conversation state machine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// How long Success / Invalid stay visible before returning to Idle.
    pub result_display_secs: f32,
    /// Confidence recorded for keyword-spotter wake events.
    pub wake_confidence: f32,
    /// Shown when an utterance ends with nothing recognized.
    pub empty_utterance_message: String,
    /// Treat a silence timeout after some speech as end of utterance.
    pub process_on_silence_after_speech: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            result_display_secs: 4.0,
            wake_confidence: 0.9,
            empty_utterance_message: "I'm here for you.".to_owned(),
            process_on_silence_after_speech: true,
        }
    }
}

impl ConversationConfig {
    /// Display duration as a [`Duration`].
    pub fn result_display(&self) -> Duration {
        Duration::from_secs_f32(self.result_display_secs.max(0.0))
    }
}

impl VoiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| VoiceError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VoiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config_dir>/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::paths::config_dir().join("config.toml")
    }

    /// Check ranges and URLs.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(VoiceError::Config("audio.sample_rate must be > 0".into()));
        }
        if self.audio.buffer_seconds == 0 {
            return Err(VoiceError::Config("audio.buffer_seconds must be > 0".into()));
        }
        if self.asr.chunk_size == 0 {
            return Err(VoiceError::Config("asr.chunk_size must be > 0".into()));
        }
        let silence = self.asr.parameters.max_sentence_silence;
        if !(200..=6000).contains(&silence) {
            return Err(VoiceError::Config(format!(
                "asr.parameters.max_sentence_silence must be within 200..=6000, got {silence}"
            )));
        }
        if self.asr.silence_timeout_secs <= 0.0 {
            return Err(VoiceError::Config(
                "asr.silence_timeout_secs must be > 0".into(),
            ));
        }
        if self.asr.max_recording_secs <= 0.0 {
            return Err(VoiceError::Config("asr.max_recording_secs must be > 0".into()));
        }
        if self.nlu.command_limit == 0 {
            return Err(VoiceError::Config("nlu.command_limit must be > 0".into()));
        }
        url::Url::parse(&self.asr.url)
            .map_err(|e| VoiceError::Config(format!("asr.url: {e}")))?;
        url::Url::parse(&self.llm.base_url)
            .map_err(|e| VoiceError::Config(format!("llm.base_url: {e}")))?;
        Ok(())
    }
}
