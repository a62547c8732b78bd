//! Session engine
//!
//! One task owns the whole session: the phase, the channel, the microphone
//! stream, the audio pipeline, the timers and the heartbeat. Caller commands
//! and everything asynchronous (microphone acquisition, channel open, inbound
//! traffic, audio frames, timer firings) arrive as messages on the loop, each
//! tagged with the epoch it belongs to. Teardown bumps the epoch, so results
//! of abandoned work are recognised and discarded.

use super::config::{SessionConfig, Timeouts};
use super::connection::{build_ws_url, redacted, ChannelHandle, Connector, Link, LinkEvent};
use super::error::{SessionError, TransportError};
use super::heartbeat::{HeartbeatMonitor, Liveness};
use super::messages::{ClientMessage, ErrorPayload};
use super::router::{self, CommitAck, CommitFence, Routed};
use super::state::{
    Attempt, Handshake, HandshakeProgress, HandshakeSignal, Phase, ResumeIntent, Resuming,
    SessionState,
};
use super::timers::{TimerKind, Timers};
use super::transcript::TranscriptLog;
use crate::audio::{
    encode_base64_pcm16, AcquireError, AudioFrame, AudioPipeline, MicStream, MicrophoneSource,
};
use crate::sinks::{Notifier, Severity, StatusObserver, TextSink};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// External collaborators the engine drives
#[derive(Clone)]
pub struct Collaborators {
    pub connector: Arc<dyn Connector>,
    pub microphone: Arc<dyn MicrophoneSource>,
    pub text_sink: Arc<dyn TextSink>,
    pub notifier: Arc<dyn Notifier>,
    pub observer: Arc<dyn StatusObserver>,
}

pub(crate) type Reply = oneshot::Sender<Result<(), SessionError>>;

pub(crate) enum Command {
    Start {
        config: Box<SessionConfig>,
        reply: Reply,
    },
    Pause {
        reply: Reply,
    },
    Resume {
        reply: Reply,
    },
    Stop {
        reply: Reply,
    },
}

pub(crate) enum LoopEvent {
    MicAcquired {
        epoch: u64,
        result: Result<MicStream, AcquireError>,
    },
    LinkOpened {
        epoch: u64,
        result: Result<Link, TransportError>,
    },
    Link {
        epoch: u64,
        event: LinkEvent,
    },
    Frame {
        epoch: u64,
        frame: AudioFrame,
    },
    Timer {
        epoch: u64,
        kind: TimerKind,
        token: u64,
    },
}

pub(crate) struct SessionEngine {
    pub(super) deps: Collaborators,
    pub(super) timeouts: Timeouts,
    events_tx: mpsc::UnboundedSender<LoopEvent>,
    state_tx: watch::Sender<SessionState>,
    transcript: Arc<Mutex<TranscriptLog>>,
    pub(super) epoch: u64,
    pub(super) phase: Phase,
    config: SessionConfig,
    channel: Option<ChannelHandle>,
    mic: Option<MicStream>,
    pipeline: Option<AudioPipeline>,
    connect_task: Option<JoinHandle<()>>,
    pub(super) timers: Timers,
    heartbeat: HeartbeatMonitor,
    fence: CommitFence,
    speech_in_progress: bool,
    frames_sent: u64,
    frames_dropped: u64,
}

impl SessionEngine {
    pub(crate) fn new(
        deps: Collaborators,
        timeouts: Timeouts,
        events_tx: mpsc::UnboundedSender<LoopEvent>,
        state_tx: watch::Sender<SessionState>,
        transcript: Arc<Mutex<TranscriptLog>>,
    ) -> Self {
        Self {
            deps,
            timeouts,
            timers: Timers::new(events_tx.clone()),
            events_tx,
            state_tx,
            transcript,
            epoch: 0,
            phase: Phase::Idle,
            config: SessionConfig::default(),
            channel: None,
            mic: None,
            pipeline: None,
            connect_task: None,
            heartbeat: HeartbeatMonitor::new(
                timeouts.heartbeat_interval,
                timeouts.heartbeat_watchdog,
            ),
            fence: CommitFence::default(),
            speech_in_progress: false,
            frames_sent: 0,
            frames_dropped: 0,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<LoopEvent>,
    ) {
        debug!("Session engine running");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.on_event(event),
            }
        }

        if !matches!(self.phase, Phase::Idle) {
            info!("All client handles dropped, stopping session");
            self.teardown(SessionError::EngineStopped);
        }
        debug!("Session engine finished");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Start { config, reply } => self.start(*config, reply),
            Command::Pause { reply } => {
                let _ = reply.send(self.pause());
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.resume());
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.stop());
            }
        }
    }

    fn start(&mut self, config: SessionConfig, reply: Reply) {
        if !matches!(self.phase, Phase::Idle) {
            let _ = reply.send(self.user_error(SessionError::AlreadyActive));
            return;
        }

        info!(
            endpoint = %config.api_endpoint,
            sample_rate = config.sample_rate,
            channels = config.channels,
            language = %config.language,
            "Starting transcription session"
        );

        self.transcript_log().clear();
        self.epoch += 1;
        self.config = config;
        self.frames_sent = 0;
        self.frames_dropped = 0;
        self.phase = Phase::Acquiring {
            attempt: Attempt::Initial { reply },
        };
        self.publish();
        self.spawn_acquire();
    }

    fn pause(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Streaming => {
                self.phase = Phase::Paused;
                self.timers.cancel(TimerKind::MaxDuration);
                self.publish();
                info!("Transcription paused");
                self.deps
                    .notifier
                    .notify("Transcription paused", Severity::Info);
                Ok(())
            }
            Phase::Paused => Ok(()),
            _ => self.user_error(SessionError::NotActive),
        }
    }

    fn resume(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Paused => {
                self.phase = Phase::Streaming;
                self.publish();
                self.arm_max_duration();
                info!("Transcription resumed");
                self.deps
                    .notifier
                    .notify("Transcription resumed", Severity::Success);
                Ok(())
            }
            Phase::Streaming | Phase::Standby { resuming: Some(_) } => Ok(()),
            Phase::Standby { resuming: None } => {
                info!("Re-acquiring microphone");
                self.phase = Phase::Standby {
                    resuming: Some(Resuming {
                        intent: ResumeIntent::Streaming,
                        after_reconnect: false,
                    }),
                };
                self.spawn_acquire();
                Ok(())
            }
            _ => self.user_error(SessionError::NotActive),
        }
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Idle => self.user_error(SessionError::NotActive),
            Phase::Closing => Ok(()),
            _ => {
                info!("Stopping transcription");
                self.teardown(SessionError::Stopped);
                self.deps
                    .notifier
                    .notify("Transcription stopped", Severity::Info);
                Ok(())
            }
        }
    }

    fn user_error(&self, error: SessionError) -> Result<(), SessionError> {
        warn!("{}", error);
        self.deps
            .notifier
            .notify(&error.to_string(), Severity::Warning);
        Err(error)
    }

    fn on_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::MicAcquired { epoch, result } => {
                if epoch != self.epoch {
                    if let Ok(mut stream) = result {
                        debug!("Releasing microphone acquired for an abandoned attempt");
                        self.deps.microphone.release(&mut stream);
                    }
                    return;
                }
                self.on_mic_acquired(result);
            }
            LoopEvent::LinkOpened { epoch, result } => {
                if epoch != self.epoch {
                    if result.is_ok() {
                        debug!("Closing channel opened for an abandoned attempt");
                    }
                    return;
                }
                self.on_link_opened(result);
            }
            LoopEvent::Link { epoch, event } => {
                if epoch == self.epoch {
                    self.on_link_event(event);
                }
            }
            LoopEvent::Frame { epoch, frame } => {
                if epoch == self.epoch {
                    self.on_frame(frame);
                }
            }
            LoopEvent::Timer { epoch, kind, token } => {
                if epoch == self.epoch && self.timers.claim(kind, token) {
                    self.on_timer(kind);
                }
            }
        }
    }

    pub(super) fn spawn_acquire(&mut self) {
        let spec = self.config.capture_spec();
        let microphone = self.deps.microphone.clone();
        let events = self.events_tx.clone();
        let epoch = self.epoch;

        tokio::spawn(async move {
            let result = microphone.acquire(spec).await;
            let _ = events.send(LoopEvent::MicAcquired { epoch, result });
        });
    }

    fn on_mic_acquired(&mut self, result: Result<MicStream, AcquireError>) {
        match std::mem::replace(&mut self.phase, Phase::Closing) {
            Phase::Acquiring { attempt } => match result {
                Ok(stream) => {
                    info!(
                        sample_rate = stream.sample_rate,
                        channels = stream.channels,
                        "Microphone acquired"
                    );
                    self.mic = Some(stream);
                    self.begin_connect(attempt);
                }
                Err(e) => {
                    self.phase = Phase::Acquiring { attempt };
                    self.fail(SessionError::Acquire(e));
                }
            },
            Phase::Standby {
                resuming: Some(resuming),
            } => match result {
                Ok(stream) => {
                    self.start_audio(stream, resuming.intent);
                    let message = if resuming.after_reconnect {
                        "Reconnected - transcription resumed"
                    } else {
                        "Transcription resumed"
                    };
                    self.deps.notifier.notify(message, Severity::Success);
                }
                Err(e) => {
                    warn!("Microphone unavailable while link is up: {}", e);
                    self.phase = Phase::Standby { resuming: None };
                    self.publish();
                    self.deps.notifier.notify(
                        &format!("Connected, but audio capture failed: {}. Resume to retry.", e),
                        Severity::Warning,
                    );
                }
            },
            other => {
                self.phase = other;
                if let Ok(mut stream) = result {
                    self.deps.microphone.release(&mut stream);
                }
            }
        }
    }

    pub(super) fn begin_connect(&mut self, attempt: Attempt) {
        self.phase = Phase::Connecting { attempt };
        self.publish();

        let url = match build_ws_url(
            &self.config.api_endpoint,
            &self.config.api_key,
            &self.config.realtime_model,
        ) {
            Ok(url) => url,
            Err(e) => {
                self.fail(e.into());
                return;
            }
        };

        info!(url = %redacted(&url), "Connecting to realtime endpoint");
        self.timers
            .arm(self.epoch, TimerKind::Connect, self.timeouts.connect);

        let connector = self.deps.connector.clone();
        let events = self.events_tx.clone();
        let epoch = self.epoch;
        self.connect_task = Some(tokio::spawn(async move {
            let result = connector.open(&url).await;
            let _ = events.send(LoopEvent::LinkOpened { epoch, result });
        }));
    }

    fn on_link_opened(&mut self, result: Result<Link, TransportError>) {
        self.connect_task = None;
        match std::mem::replace(&mut self.phase, Phase::Closing) {
            Phase::Connecting { attempt } => {
                self.timers.cancel(TimerKind::Connect);
                match result {
                    Ok(link) => {
                        info!("Channel open, waiting for session handshake");
                        self.attach_channel(link);
                        self.phase = Phase::HandshakeWait {
                            attempt,
                            handshake: Handshake::Waiting,
                        };
                        self.publish();
                        self.timers
                            .arm(self.epoch, TimerKind::Handshake, self.timeouts.handshake);
                    }
                    Err(e) => {
                        self.phase = Phase::Connecting { attempt };
                        self.fail(e.into());
                    }
                }
            }
            other => {
                self.phase = other;
                debug!("Ignoring channel opened outside of connect");
            }
        }
    }

    fn attach_channel(&mut self, link: Link) {
        let Link {
            outbound,
            mut inbound,
        } = link;
        let events = self.events_tx.clone();
        let epoch = self.epoch;

        let forwarder = tokio::spawn(async move {
            loop {
                match inbound.recv().await {
                    Some(event) => {
                        let terminal = matches!(event, LinkEvent::Closed(_) | LinkEvent::Error(_));
                        if events.send(LoopEvent::Link { epoch, event }).is_err() || terminal {
                            break;
                        }
                    }
                    None => {
                        let _ = events.send(LoopEvent::Link {
                            epoch,
                            event: LinkEvent::Closed(None),
                        });
                        break;
                    }
                }
            }
        });

        self.channel = Some(ChannelHandle::new(outbound, forwarder));
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Message(text) => {
                self.heartbeat.record_traffic(&mut self.timers);
                self.on_message(&text);
            }
            LinkEvent::Liveness => self.heartbeat.record_traffic(&mut self.timers),
            LinkEvent::Closed(reason) => {
                let reason = reason.unwrap_or_else(|| "closed by server".to_string());
                warn!("Channel closed: {}", reason);
                self.fail(SessionError::ChannelClosed(reason));
            }
            LinkEvent::Error(e) => {
                warn!("Channel error: {}", e);
                self.fail(SessionError::ChannelClosed(e));
            }
        }
    }

    fn on_message(&mut self, text: &str) {
        let routed = match router::route(text) {
            Ok(routed) => routed,
            Err(e) => {
                warn!("{} - {}", e, text);
                return;
            }
        };

        match routed {
            Routed::Handshake(signal) => self.on_handshake(signal),
            Routed::ConfigAcknowledged => self.on_config_acknowledged(),
            Routed::SpeechStarted => self.on_speech_started(),
            Routed::SpeechStopped => self.on_speech_stopped(),
            Routed::Committed { item_id } => self.on_committed(item_id),
            Routed::Transcript { text, item_id } => self.on_transcript(&text, item_id.as_deref()),
            Routed::TranscriptionFailed { item_id, message } => {
                warn!(?item_id, "Transcription failed: {}", message);
                self.deps
                    .notifier
                    .notify(&format!("Transcription failed: {}", message), Severity::Error);
            }
            Routed::ServerError(payload) => self.on_server_error(payload),
            Routed::Pong => trace!("Heartbeat pong"),
            Routed::Ignored => trace!("Ignoring server message"),
        }
    }

    fn on_handshake(&mut self, signal: HandshakeSignal) {
        let complete = match &mut self.phase {
            Phase::HandshakeWait { handshake, .. } => match handshake.record(signal) {
                HandshakeProgress::Pending(next) => {
                    *handshake = next;
                    false
                }
                HandshakeProgress::Complete => true,
            },
            _ => {
                debug!(?signal, "Ignoring handshake signal outside of handshake");
                return;
            }
        };

        debug!(?signal, "Handshake signal received");
        if complete {
            self.begin_configure();
        }
    }

    fn begin_configure(&mut self) {
        let attempt = match std::mem::replace(&mut self.phase, Phase::Closing) {
            Phase::HandshakeWait { attempt, .. } => attempt,
            other => {
                self.phase = other;
                return;
            }
        };

        self.timers.cancel(TimerKind::Handshake);
        info!("Handshake complete, sending session configuration");
        self.phase = Phase::Configuring { attempt };
        self.publish();

        let session = self.config.session_update();
        if !self.send(&ClientMessage::SessionUpdate { session }) {
            self.fail(SessionError::ChannelClosed(
                "could not send session configuration".to_string(),
            ));
            return;
        }
        self.timers
            .arm(self.epoch, TimerKind::Configure, self.timeouts.configure);
    }

    fn on_config_acknowledged(&mut self) {
        let attempt = match std::mem::replace(&mut self.phase, Phase::Closing) {
            Phase::Configuring { attempt } => attempt,
            other => {
                self.phase = other;
                debug!("Ignoring session.updated outside of configuration");
                return;
            }
        };

        self.timers.cancel(TimerKind::Configure);
        info!("Session configured");
        self.heartbeat.start(self.epoch, &mut self.timers);

        match attempt {
            Attempt::Initial { reply } => {
                match self.mic.take() {
                    Some(stream) => self.start_audio(stream, ResumeIntent::Streaming),
                    None => {
                        self.phase = Phase::Standby { resuming: None };
                        self.publish();
                    }
                }
                self.deps
                    .notifier
                    .notify("Transcription started", Severity::Success);
                let _ = reply.send(Ok(()));
            }
            Attempt::Reconnect { resume } => self.on_reconnected(resume),
        }
    }

    fn start_audio(&mut self, stream: MicStream, intent: ResumeIntent) {
        let events = self.events_tx.clone();
        let epoch = self.epoch;
        self.pipeline = Some(AudioPipeline::open(
            stream,
            self.config.capture_spec(),
            move |frame| {
                let _ = events.send(LoopEvent::Frame { epoch, frame });
            },
        ));

        self.phase = match intent {
            ResumeIntent::Streaming => Phase::Streaming,
            ResumeIntent::Paused => Phase::Paused,
        };
        self.publish();
        self.arm_max_duration();
        info!(?intent, "Audio pipeline active");
    }

    fn on_speech_started(&mut self) {
        if !self.phase.is_established() {
            return;
        }
        debug!("VAD: speech started");
        self.speech_in_progress = true;
        self.timers.cancel(TimerKind::MaxDuration);
        let fenced = self.fence.speech_started();
        if fenced > 0 {
            debug!(fenced, "New utterance started before commit was acknowledged");
        }
    }

    fn on_speech_stopped(&mut self) {
        if !self.phase.is_established() {
            return;
        }
        debug!("VAD: speech stopped");
        self.speech_in_progress = false;
        self.commit();
    }

    fn commit(&mut self) {
        if !self.channel_open() {
            return;
        }
        let seq = self.fence.begin_commit();
        if self.send(&ClientMessage::InputAudioBufferCommit) {
            debug!(seq, "Audio buffer committed");
        }
    }

    fn on_committed(&mut self, item_id: Option<String>) {
        match self.fence.acknowledge() {
            CommitAck::Clear { seq } => {
                debug!(seq, ?item_id, "Commit acknowledged, clearing buffer");
                self.send(&ClientMessage::InputAudioBufferClear);
                self.arm_max_duration();
            }
            CommitAck::Fenced { seq } => {
                debug!(seq, "Commit acknowledged after new speech started, buffer kept");
            }
            CommitAck::Unsolicited => debug!(?item_id, "Server committed buffer"),
        }
    }

    fn arm_max_duration(&mut self) {
        let Some(limit) = self.config.max_audio_duration else {
            return;
        };
        if matches!(self.phase, Phase::Streaming) {
            self.timers.arm(self.epoch, TimerKind::MaxDuration, limit);
        }
    }

    fn on_transcript(&mut self, text: &str, item_id: Option<&str>) {
        info!(?item_id, chars = text.len(), "Transcription completed");
        self.transcript_log().push(text, item_id);
        if let Err(e) = self.deps.text_sink.insert(text, item_id) {
            warn!("Failed to insert transcription: {}", e);
            self.deps.notifier.notify(
                &format!("Could not insert transcription: {}", e),
                Severity::Warning,
            );
        }
    }

    fn on_server_error(&mut self, payload: ErrorPayload) {
        let message = payload.message_or_default();
        if payload.is_empty_buffer() {
            match self.fence.reject() {
                Some(seq) => debug!(seq, "Server rejected commit of empty buffer: {}", message),
                None => debug!("Server rejected empty buffer: {}", message),
            }
            return;
        }

        error!(
            code = ?payload.code,
            error_type = ?payload.error_type,
            "Server error: {}",
            message
        );

        if matches!(self.phase, Phase::Configuring { .. }) || payload.invalidates_session() {
            self.fail(SessionError::Protocol {
                code: payload.code,
                message,
            });
        } else {
            self.deps
                .notifier
                .notify(&format!("Server error: {}", message), Severity::Error);
        }
    }

    fn on_frame(&mut self, frame: AudioFrame) {
        if !matches!(self.phase, Phase::Streaming) || !self.channel_open() {
            self.frames_dropped += 1;
            trace!("Dropping audio frame");
            return;
        }

        let audio = encode_base64_pcm16(&frame.samples);
        if self.send(&ClientMessage::InputAudioBufferAppend { audio }) {
            self.frames_sent += 1;
            if self.frames_sent % 100 == 1 {
                debug!(
                    frames_sent = self.frames_sent,
                    frames_dropped = self.frames_dropped,
                    "Streaming audio"
                );
            }
        }
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Connect => {
                if matches!(self.phase, Phase::Connecting { .. }) {
                    self.fail(SessionError::ConnectTimeout(self.timeouts.connect));
                }
            }
            TimerKind::Handshake => {
                if matches!(self.phase, Phase::HandshakeWait { .. }) {
                    self.fail(SessionError::HandshakeTimeout(self.timeouts.handshake));
                }
            }
            TimerKind::Configure => {
                if matches!(self.phase, Phase::Configuring { .. }) {
                    self.fail(SessionError::ConfigTimeout(self.timeouts.configure));
                }
            }
            TimerKind::HeartbeatTick => {
                let link_open = self.channel_open();
                if self.heartbeat.on_tick(self.epoch, &mut self.timers, link_open) {
                    trace!("Sending heartbeat ping");
                    self.send(&ClientMessage::heartbeat_ping());
                }
            }
            TimerKind::HeartbeatWatchdog => {
                if self.heartbeat.on_watchdog() == Liveness::Dead {
                    self.on_link_lost();
                }
            }
            TimerKind::ReconnectBackoff => self.retry_connect(),
            TimerKind::MaxDuration => {
                if matches!(self.phase, Phase::Streaming) && !self.speech_in_progress {
                    info!("No utterance boundary within max duration, forcing commit");
                    self.commit();
                    self.arm_max_duration();
                }
            }
        }
    }

    fn send(&self, message: &ClientMessage) -> bool {
        let Some(channel) = self.channel.as_ref() else {
            debug!(kind = message.kind(), "No channel, message dropped");
            return false;
        };
        match message.to_json() {
            Ok(json) => {
                if channel.send(json) {
                    trace!(kind = message.kind(), "Message sent");
                    true
                } else {
                    warn!(kind = message.kind(), "Channel closed, message dropped");
                    false
                }
            }
            Err(e) => {
                error!("Failed to serialize {}: {}", message.kind(), e);
                false
            }
        }
    }

    fn channel_open(&self) -> bool {
        self.channel.as_ref().is_some_and(ChannelHandle::is_open)
    }

    pub(super) fn publish(&self) {
        let state = self.phase.public();
        self.state_tx.send_replace(state);
        self.deps
            .observer
            .on_state_change(state, self.phase.ready_flags());
    }

    fn transcript_log(&self) -> MutexGuard<'_, TranscriptLog> {
        match self.transcript.lock() {
            Ok(log) => log,
            Err(poisoned) => {
                warn!("Transcript mutex was poisoned, recovering data");
                poisoned.into_inner()
            }
        }
    }

    /// Fail the current attempt or session and tear everything down
    pub(super) fn fail(&mut self, error: SessionError) {
        if self.phase.is_reconnecting() {
            error!("Reconnection failed: {}", error);
            self.deps
                .notifier
                .notify(&format!("Reconnection failed: {}", error), Severity::Error);
        } else {
            error!("Transcription failed: {}", error);
            self.deps
                .notifier
                .notify(&error.to_string(), Severity::Error);
        }
        self.teardown(error);
    }

    /// The single teardown path
    ///
    /// Moves through `Closing` to `Idle`, releasing every resource exactly
    /// once. A start still waiting on its result receives `reason`.
    fn teardown(&mut self, reason: SessionError) {
        let previous = std::mem::replace(&mut self.phase, Phase::Closing);
        self.publish();

        self.release_link();
        self.release_audio();
        self.epoch += 1;

        if let Some(Attempt::Initial { reply }) = previous.into_attempt() {
            let _ = reply.send(Err(reason));
        }

        self.phase = Phase::Idle;
        self.publish();
        info!(
            frames_sent = self.frames_sent,
            frames_dropped = self.frames_dropped,
            "Session closed"
        );
    }

    /// Close the channel and cancel everything tied to it
    pub(super) fn release_link(&mut self) {
        self.timers.cancel_all();
        self.heartbeat.stop(&mut self.timers);
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        self.fence.reset();
        self.speech_in_progress = false;
    }

    /// Close the audio pipeline and release the microphone
    pub(super) fn release_audio(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.close(self.deps.microphone.as_ref());
        }
        if let Some(mut stream) = self.mic.take() {
            self.deps.microphone.release(&mut stream);
        }
    }
}
