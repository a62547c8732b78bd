//! Session state
//!
//! The session is one tagged [`Phase`] value. Data that only exists in a given
//! phase (the pending start continuation, handshake progress, reconnect
//! intent) lives inside that variant, so impossible flag combinations cannot
//! be represented.

use super::error::SessionError;
use tokio::sync::oneshot;

/// Externally visible session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Acquiring the microphone, opening the channel, or waiting to reconnect
    Connecting,
    HandshakeWait,
    Configuring,
    Streaming,
    Paused,
    /// Channel configured and alive, audio pipeline inactive
    Standby,
    Closing,
}

/// Readiness flags reported to status observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadyFlags {
    /// Channel is open
    pub link_ready: bool,
    /// Audio pipeline is running
    pub audio_ready: bool,
    /// Transcription is active (streaming or paused)
    pub transcribing: bool,
    pub paused: bool,
}

/// Server signal that is part of the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeSignal {
    SessionCreated,
    ConversationCreated,
}

/// Handshake progress while waiting for both signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handshake {
    Waiting,
    SessionCreated,
    ConversationCreated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeProgress {
    Pending(Handshake),
    Complete,
}

impl Handshake {
    /// Record one signal; completes once both have been seen, in either order
    pub(crate) fn record(self, signal: HandshakeSignal) -> HandshakeProgress {
        match (self, signal) {
            (Handshake::Waiting, HandshakeSignal::SessionCreated) => {
                HandshakeProgress::Pending(Handshake::SessionCreated)
            }
            (Handshake::Waiting, HandshakeSignal::ConversationCreated) => {
                HandshakeProgress::Pending(Handshake::ConversationCreated)
            }
            (Handshake::SessionCreated, HandshakeSignal::ConversationCreated)
            | (Handshake::ConversationCreated, HandshakeSignal::SessionCreated) => {
                HandshakeProgress::Complete
            }
            (current, _) => HandshakeProgress::Pending(current),
        }
    }
}

/// Audio state to restore once a lost link is re-established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResumeIntent {
    Streaming,
    Paused,
}

/// Why a connect/handshake/configure sequence is running
pub(crate) enum Attempt {
    /// Caller-requested start; resolved once streaming or failed
    Initial {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Automatic reconnection after link loss
    Reconnect { resume: Option<ResumeIntent> },
}

impl Attempt {
    pub(crate) fn is_reconnect(&self) -> bool {
        matches!(self, Attempt::Reconnect { .. })
    }
}

/// Microphone re-acquisition in flight while in standby
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Resuming {
    pub intent: ResumeIntent,
    pub after_reconnect: bool,
}

pub(crate) enum Phase {
    Idle,
    Acquiring { attempt: Attempt },
    Connecting { attempt: Attempt },
    HandshakeWait { attempt: Attempt, handshake: Handshake },
    Configuring { attempt: Attempt },
    Streaming,
    Paused,
    Standby { resuming: Option<Resuming> },
    Backoff { resume: Option<ResumeIntent> },
    Closing,
}

impl Phase {
    pub(crate) fn public(&self) -> SessionState {
        match self {
            Phase::Idle => SessionState::Idle,
            Phase::Acquiring { .. } | Phase::Connecting { .. } | Phase::Backoff { .. } => {
                SessionState::Connecting
            }
            Phase::HandshakeWait { .. } => SessionState::HandshakeWait,
            Phase::Configuring { .. } => SessionState::Configuring,
            Phase::Streaming => SessionState::Streaming,
            Phase::Paused => SessionState::Paused,
            Phase::Standby { .. } => SessionState::Standby,
            Phase::Closing => SessionState::Closing,
        }
    }

    pub(crate) fn ready_flags(&self) -> ReadyFlags {
        let link_ready = matches!(
            self,
            Phase::HandshakeWait { .. }
                | Phase::Configuring { .. }
                | Phase::Streaming
                | Phase::Paused
                | Phase::Standby { .. }
        );
        let audio_ready = matches!(self, Phase::Streaming | Phase::Paused);
        ReadyFlags {
            link_ready,
            audio_ready,
            transcribing: audio_ready,
            paused: matches!(self, Phase::Paused),
        }
    }

    /// Session has completed configuration at least once on the current link
    pub(crate) fn is_established(&self) -> bool {
        matches!(self, Phase::Streaming | Phase::Paused | Phase::Standby { .. })
    }

    /// The in-flight attempt, if this phase belongs to one
    pub(crate) fn into_attempt(self) -> Option<Attempt> {
        match self {
            Phase::Acquiring { attempt }
            | Phase::Connecting { attempt }
            | Phase::HandshakeWait { attempt, .. }
            | Phase::Configuring { attempt } => Some(attempt),
            _ => None,
        }
    }

    pub(crate) fn is_reconnecting(&self) -> bool {
        match self {
            Phase::Backoff { .. } => true,
            Phase::Acquiring { attempt }
            | Phase::Connecting { attempt }
            | Phase::HandshakeWait { attempt, .. }
            | Phase::Configuring { attempt } => attempt.is_reconnect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_completes_in_either_order() {
        let first = Handshake::Waiting.record(HandshakeSignal::SessionCreated);
        assert_eq!(first, HandshakeProgress::Pending(Handshake::SessionCreated));
        assert_eq!(
            Handshake::SessionCreated.record(HandshakeSignal::ConversationCreated),
            HandshakeProgress::Complete
        );

        let first = Handshake::Waiting.record(HandshakeSignal::ConversationCreated);
        assert_eq!(
            first,
            HandshakeProgress::Pending(Handshake::ConversationCreated)
        );
        assert_eq!(
            Handshake::ConversationCreated.record(HandshakeSignal::SessionCreated),
            HandshakeProgress::Complete
        );
    }

    #[test]
    fn duplicate_signal_does_not_complete_handshake() {
        assert_eq!(
            Handshake::SessionCreated.record(HandshakeSignal::SessionCreated),
            HandshakeProgress::Pending(Handshake::SessionCreated)
        );
        assert_eq!(
            Handshake::ConversationCreated.record(HandshakeSignal::ConversationCreated),
            HandshakeProgress::Pending(Handshake::ConversationCreated)
        );
    }

    #[test]
    fn ready_flags_follow_phase() {
        assert_eq!(Phase::Idle.ready_flags(), ReadyFlags::default());

        let streaming = Phase::Streaming.ready_flags();
        assert!(streaming.link_ready && streaming.audio_ready && streaming.transcribing);
        assert!(!streaming.paused);

        let paused = Phase::Paused.ready_flags();
        assert!(paused.paused && paused.transcribing);

        let standby = Phase::Standby { resuming: None }.ready_flags();
        assert!(standby.link_ready);
        assert!(!standby.audio_ready && !standby.transcribing);

        let backoff = Phase::Backoff { resume: None };
        assert_eq!(backoff.public(), SessionState::Connecting);
        assert!(!backoff.ready_flags().link_ready);
        assert!(backoff.is_reconnecting());
    }
}
