//! Per-session configuration snapshot

use super::messages::{InputAudioFormat, InputAudioTranscription, SessionUpdate, TurnDetection};
use crate::audio::CaptureSpec;
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Immutable configuration captured when a session starts
#[derive(Clone)]
pub struct SessionConfig {
    pub api_endpoint: String,
    pub api_key: Zeroizing<String>,
    pub realtime_model: String,
    /// Transcription model named in `session.update`
    pub model: String,
    pub language: String,
    pub audio_format: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Server VAD threshold, 0.0..=1.0
    pub vad_sensitivity: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    /// Samples per channel in each audio frame
    pub block_size: usize,
    /// Force a commit when no utterance boundary arrives within this window
    pub max_audio_duration: Option<Duration>,
}

impl SessionConfig {
    pub fn capture_spec(&self) -> CaptureSpec {
        CaptureSpec {
            sample_rate: self.sample_rate,
            channels: self.channels,
            block_size: self.block_size,
        }
    }

    pub(crate) fn session_update(&self) -> SessionUpdate {
        SessionUpdate {
            modality: "audio".to_string(),
            input_audio_format: InputAudioFormat {
                format_type: self.audio_format.clone(),
                sample_rate: self.sample_rate,
                channels: self.channels,
            },
            input_audio_transcription: InputAudioTranscription {
                model: self.model.clone(),
                language: self.language.clone(),
            },
            turn_detection: TurnDetection {
                detection_type: "server_vad".to_string(),
                threshold: self.vad_sensitivity,
                prefix_padding_ms: self.prefix_padding_ms,
                silence_duration_ms: self.silence_duration_ms,
            },
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "wss://api.openai.com/v1/realtime".to_string(),
            api_key: Zeroizing::new(String::new()),
            realtime_model: "gpt-4o-realtime-preview-2024-12-17".to_string(),
            model: "whisper-1".to_string(),
            language: "en".to_string(),
            audio_format: "pcm16".to_string(),
            sample_rate: 24000,
            channels: 1,
            vad_sensitivity: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 2000,
            block_size: 4096,
            max_audio_duration: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("api_endpoint", &self.api_endpoint)
            .field("api_key", &"<redacted>")
            .field("realtime_model", &self.realtime_model)
            .field("model", &self.model)
            .field("language", &self.language)
            .field("audio_format", &self.audio_format)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("vad_sensitivity", &self.vad_sensitivity)
            .field("prefix_padding_ms", &self.prefix_padding_ms)
            .field("silence_duration_ms", &self.silence_duration_ms)
            .field("block_size", &self.block_size)
            .field("max_audio_duration", &self.max_audio_duration)
            .finish()
    }
}

/// Engine timing; fixed for the lifetime of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub handshake: Duration,
    pub configure: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_watchdog: Duration,
    pub reconnect_backoff: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            handshake: Duration::from_secs(10),
            configure: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_watchdog: Duration::from_secs(10),
            reconnect_backoff: Duration::from_secs(3),
        }
    }
}
