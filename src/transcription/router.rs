//! Inbound event routing
//!
//! Turns raw channel text into a [`Routed`] event for the session engine, and
//! tracks the commit/clear cycle driven by server VAD.

use super::error::DecodeError;
use super::messages::{ErrorPayload, ServerMessage};
use super::state::HandshakeSignal;
use std::collections::VecDeque;

/// A parsed inbound message, classified by who handles it
#[derive(Debug, PartialEq)]
pub(crate) enum Routed {
    Handshake(HandshakeSignal),
    ConfigAcknowledged,
    SpeechStarted,
    SpeechStopped,
    Committed {
        item_id: Option<String>,
    },
    Transcript {
        text: String,
        item_id: Option<String>,
    },
    TranscriptionFailed {
        item_id: Option<String>,
        message: String,
    },
    ServerError(ErrorPayload),
    Pong,
    /// Unknown type, or a known one with nothing to act on
    Ignored,
}

/// Parse and classify one inbound text message
pub(crate) fn route(text: &str) -> Result<Routed, DecodeError> {
    let message: ServerMessage = serde_json::from_str(text)?;

    let routed = match message {
        ServerMessage::SessionCreated => Routed::Handshake(HandshakeSignal::SessionCreated),
        ServerMessage::ConversationCreated => {
            Routed::Handshake(HandshakeSignal::ConversationCreated)
        }
        ServerMessage::SessionUpdated => Routed::ConfigAcknowledged,
        ServerMessage::SpeechStarted => Routed::SpeechStarted,
        ServerMessage::SpeechStopped => Routed::SpeechStopped,
        ServerMessage::Committed { item_id } => Routed::Committed { item_id },
        completed @ ServerMessage::TranscriptionCompleted { .. } => match completed
            .completed_transcript()
        {
            Some((text, item_id)) if !text.trim().is_empty() => {
                Routed::Transcript { text, item_id }
            }
            _ => Routed::Ignored,
        },
        ServerMessage::TranscriptionFailed { item_id, error } => Routed::TranscriptionFailed {
            item_id,
            message: error.unwrap_or_default().message_or_default(),
        },
        ServerMessage::Error { error } => Routed::ServerError(error.unwrap_or_default()),
        ServerMessage::HeartbeatPong => Routed::Pong,
        ServerMessage::Other => Routed::Ignored,
    };

    Ok(routed)
}

/// What to do with a `committed` acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommitAck {
    /// Send `clear` for this commit
    Clear { seq: u64 },
    /// A new utterance started after this commit; leave the buffer alone
    Fenced { seq: u64 },
    /// No commit of ours was outstanding
    Unsolicited,
}

#[derive(Debug)]
struct PendingCommit {
    seq: u64,
    clear_on_ack: bool,
}

/// Orders commit → committed → clear
///
/// Each commit sent gets a sequence number. Acknowledgements retire commits in
/// FIFO order; speech starting while commits are outstanding fences them so a
/// late acknowledgement cannot clear the new utterance's audio.
#[derive(Debug, Default)]
pub(crate) struct CommitFence {
    next_seq: u64,
    outstanding: VecDeque<PendingCommit>,
}

impl CommitFence {
    /// Register a commit about to be sent
    pub(crate) fn begin_commit(&mut self) -> u64 {
        self.next_seq += 1;
        self.outstanding.push_back(PendingCommit {
            seq: self.next_seq,
            clear_on_ack: true,
        });
        self.next_seq
    }

    /// Speech started; returns how many outstanding commits were fenced
    pub(crate) fn speech_started(&mut self) -> usize {
        let mut fenced = 0;
        for pending in self.outstanding.iter_mut().filter(|p| p.clear_on_ack) {
            pending.clear_on_ack = false;
            fenced += 1;
        }
        fenced
    }

    pub(crate) fn acknowledge(&mut self) -> CommitAck {
        match self.outstanding.pop_front() {
            Some(PendingCommit {
                seq,
                clear_on_ack: true,
            }) => CommitAck::Clear { seq },
            Some(PendingCommit { seq, .. }) => CommitAck::Fenced { seq },
            None => CommitAck::Unsolicited,
        }
    }

    /// The server refused the oldest outstanding commit; no acknowledgement will follow
    pub(crate) fn reject(&mut self) -> Option<u64> {
        self.outstanding.pop_front().map(|pending| pending.seq)
    }

    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub(crate) fn reset(&mut self) {
        self.outstanding.clear();
    }
}
