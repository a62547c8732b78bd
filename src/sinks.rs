//! Collaborators the session engine reports to
//!
//! The engine calls these from its event loop, so implementations must not
//! block for long.

use crate::transcription::{ReadyFlags, SessionState};
use std::io::Write;
use tracing::{error, info, warn};

/// Text insertion failed; reported to the user, the session continues
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct InsertError(pub String);

/// Receives completed transcriptions
pub trait TextSink: Send + Sync {
    /// Insert `text` at the caller's current position, tagged with the server item id
    fn insert(&self, text: &str, item_id: Option<&str>) -> Result<(), InsertError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing notifications; fire-and-forget
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Told about every state transition
pub trait StatusObserver: Send + Sync {
    fn on_state_change(&self, state: SessionState, flags: ReadyFlags);
}

/// Writes each transcription as a line on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl TextSink for StdoutSink {
    fn insert(&self, text: &str, _item_id: Option<&str>) -> Result<(), InsertError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", text)
            .and_then(|_| stdout.flush())
            .map_err(|e| InsertError(e.to_string()))
    }
}

/// Logs notifications through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => info!(?severity, "{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }
    }
}

/// Logs state transitions through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl StatusObserver for LogObserver {
    fn on_state_change(&self, state: SessionState, flags: ReadyFlags) {
        info!(
            ?state,
            link_ready = flags.link_ready,
            audio_ready = flags.audio_ready,
            transcribing = flags.transcribing,
            paused = flags.paused,
            "Session state changed"
        );
    }
}
