//! Realtime wire message types
//!
//! Outbound messages are serialized with an `event_id`; inbound messages are
//! internally tagged by `type` and unknown types fall into [`ServerMessage::Other`].

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Error codes that mean the server no longer recognises the session
const EMPTY_COMMIT_CODE: &str = "input_audio_buffer_commit_empty";
const SESSION_INVALIDATING_CODES: &[&str] = &["session_expired", "invalid_session"];

/// Envelope for messages sent to the server
#[derive(Debug, Serialize)]
pub(crate) struct Outbound<'a> {
    pub event_id: String,
    #[serde(flatten)]
    pub message: &'a ClientMessage,
}

impl<'a> Outbound<'a> {
    pub(crate) fn new(message: &'a ClientMessage) -> Self {
        Self {
            event_id: next_event_id(message.id_prefix()),
            message,
        }
    }
}

/// Messages sent to the realtime service
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub(crate) enum ClientMessage {
    /// Session configuration, sent once per established session
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdate },
    /// Append audio data to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    /// Finalize the buffered audio as one utterance
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,
    /// Reset the buffer for the next utterance
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,
    #[serde(rename = "heartbeat.ping")]
    HeartbeatPing { heartbeat_type: u8 },
}

impl ClientMessage {
    pub(crate) fn heartbeat_ping() -> Self {
        ClientMessage::HeartbeatPing { heartbeat_type: 0 }
    }

    /// Wire `type` tag, used for logging
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ClientMessage::SessionUpdate { .. } => "session.update",
            ClientMessage::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            ClientMessage::InputAudioBufferCommit => "input_audio_buffer.commit",
            ClientMessage::InputAudioBufferClear => "input_audio_buffer.clear",
            ClientMessage::HeartbeatPing { .. } => "heartbeat.ping",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            ClientMessage::HeartbeatPing { .. } => "heartbeat",
            _ => "event",
        }
    }

    pub(crate) fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Outbound::new(self))
    }
}

fn next_event_id(prefix: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen();
    format!(
        "{}_{}_{:04x}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}

/// Body of `session.update`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct SessionUpdate {
    pub modality: String,
    pub input_audio_format: InputAudioFormat,
    pub input_audio_transcription: InputAudioTranscription,
    pub turn_detection: TurnDetection,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct InputAudioFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct InputAudioTranscription {
    pub model: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct TurnDetection {
    #[serde(rename = "type")]
    pub detection_type: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

/// Messages received from the realtime service
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ServerMessage {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "conversation.created")]
    ConversationCreated,
    /// Acknowledges `session.update`
    #[serde(rename = "session.updated")]
    SessionUpdated,
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,
    #[serde(rename = "input_audio_buffer.committed")]
    Committed {
        #[serde(default)]
        item_id: Option<String>,
    },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        transcript: Option<String>,
        #[serde(default)]
        item: Option<ConversationItem>,
    },
    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    TranscriptionFailed {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        error: Option<ErrorPayload>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Option<ErrorPayload>,
    },
    #[serde(rename = "heartbeat.pong")]
    HeartbeatPong,
    /// Catch-all for message types this client does not act on
    #[serde(other)]
    Other,
}

/// Conversation item as carried by some transcription events
#[derive(Debug, Deserialize)]
pub(crate) struct ConversationItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentPart {
    #[serde(rename = "type", default)]
    pub part_type: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
}

/// Error details sent by the server
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ErrorPayload {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorPayload {
    pub fn message_or_default(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }

    /// Server marked the session itself as no longer usable
    pub fn invalidates_session(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| SESSION_INVALIDATING_CODES.contains(&code))
    }

    /// Commit of an empty buffer; expected when speech stops right after a clear
    pub fn is_empty_buffer(&self) -> bool {
        if self.code.as_deref() == Some(EMPTY_COMMIT_CODE) {
            return true;
        }
        self.message.as_deref().is_some_and(|m| {
            let m = m.to_ascii_lowercase();
            m.contains("buffer too small") || m.contains("buffer is empty")
        })
    }
}

impl ServerMessage {
    /// Transcript text and item id of a completed transcription
    ///
    /// Accepts both the flat (`item_id`, `transcript`) and the nested
    /// (`item.id`, `item.content[0].transcript`) shapes.
    pub(crate) fn completed_transcript(&self) -> Option<(String, Option<String>)> {
        let ServerMessage::TranscriptionCompleted {
            item_id,
            transcript,
            item,
        } = self
        else {
            return None;
        };

        let nested = item.as_ref().and_then(|item| {
            item.content
                .first()
                .filter(|part| part.part_type.as_deref() == Some("transcript"))
                .and_then(|part| part.transcript.clone())
        });
        let text = transcript.clone().or(nested)?;
        let id = item_id
            .clone()
            .or_else(|| item.as_ref().and_then(|item| item.id.clone()));
        Some((text, id))
    }
}
