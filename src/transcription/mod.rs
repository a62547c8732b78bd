//! Transcription module for real-time speech-to-text
//!
//! Streams microphone audio to a realtime transcription service over a
//! WebSocket, relying on server-side VAD to delimit utterances. The session
//! runs on a single engine task; [`TranscriptionClient`] is the cheap,
//! cloneable handle callers use to drive it. Includes heartbeat liveness
//! checks and one automatic reconnection on link loss.

mod config;
mod connection;
mod engine;
mod error;
mod heartbeat;
mod messages;
mod reconnect;
mod router;
mod state;
mod timers;
mod transcript;


pub use config::{SessionConfig, Timeouts};
pub use connection::{build_ws_url, Connector, Link, LinkEvent, WebSocketConnector};
pub use engine::Collaborators;
pub use error::{DecodeError, SessionError, TransportError};
pub use messages::ErrorPayload;
pub use state::{ReadyFlags, SessionState};
pub use transcript::{TranscriptLog, TranscriptSegment};

use engine::{Command, Reply, SessionEngine};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

/// Handle to a running session engine
///
/// Every clone drives the same engine. When the last clone is dropped the
/// engine tears any active session down and exits.
#[derive(Clone)]
pub struct TranscriptionClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    transcript: Arc<Mutex<TranscriptLog>>,
}

impl TranscriptionClient {
    /// Spawn the engine on the current tokio runtime
    pub fn spawn(deps: Collaborators, timeouts: Timeouts) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let transcript = Arc::new(Mutex::new(TranscriptLog::default()));

        let engine = SessionEngine::new(deps, timeouts, events_tx, state_tx, transcript.clone());
        tokio::spawn(engine.run(command_rx, events_rx));

        Self {
            commands: command_tx,
            state: state_rx,
            transcript,
        }
    }

    /// Start a session; resolves once audio is streaming or the attempt failed
    pub async fn start(&self, config: SessionConfig) -> Result<(), SessionError> {
        self.request(|reply| Command::Start {
            config: Box::new(config),
            reply,
        })
        .await
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Pause { reply }).await
    }

    /// Resume streaming; from standby this re-acquires the microphone
    pub async fn resume(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Resume { reply }).await
    }

    /// Stop the session; a start still in flight fails with [`SessionError::Stopped`]
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Get the transcript of the current (or last) session
    ///
    /// Returns the transcript or recovers it if the mutex is poisoned.
    pub fn transcript(&self) -> TranscriptLog {
        match self.transcript.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => {
                warn!("Transcript mutex was poisoned, recovering data");
                poisoned.into_inner().clone()
            }
        }
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .map_err(|_| SessionError::EngineStopped)?;
        reply_rx.await.map_err(|_| SessionError::EngineStopped)?
    }
}
