//! Reconnection after link loss
//!
//! When the heartbeat declares the link dead, the channel and the audio
//! pipeline are torn down, and after a short backoff a single new
//! connect/handshake/configure cycle runs. The caller's intent (streaming or
//! paused) is carried through and restored once the link is configured. A
//! failed attempt deactivates the session.

use super::engine::SessionEngine;
use super::error::SessionError;
use super::state::{Attempt, Phase, ResumeIntent, Resuming};
use super::timers::TimerKind;
use crate::sinks::Severity;
use tracing::{info, warn};

impl SessionEngine {
    pub(super) fn on_link_lost(&mut self) {
        let resume = match &self.phase {
            Phase::Streaming => Some(ResumeIntent::Streaming),
            Phase::Paused => Some(ResumeIntent::Paused),
            Phase::Standby { resuming } => resuming.map(|r| r.intent),
            _ => {
                self.fail(SessionError::LinkLost);
                return;
            }
        };

        let backoff = self.timeouts.reconnect_backoff;
        warn!(
            ?resume,
            "Connection lost, reconnecting in {}s",
            backoff.as_secs()
        );
        self.deps.notifier.notify(
            &format!("Connection lost - reconnecting in {}s", backoff.as_secs()),
            Severity::Warning,
        );

        self.release_link();
        self.release_audio();
        self.epoch += 1;
        self.phase = Phase::Backoff { resume };
        self.publish();
        self.timers
            .arm(self.epoch, TimerKind::ReconnectBackoff, backoff);
    }

    pub(super) fn retry_connect(&mut self) {
        let resume = match self.phase {
            Phase::Backoff { resume } => resume,
            _ => return,
        };
        info!("Attempting reconnection");
        self.begin_connect(Attempt::Reconnect { resume });
    }

    /// Link configured again; restore audio if it was active before the loss
    pub(super) fn on_reconnected(&mut self, resume: Option<ResumeIntent>) {
        match resume {
            Some(intent) => {
                info!(?intent, "Reconnected, re-acquiring microphone");
                self.phase = Phase::Standby {
                    resuming: Some(Resuming {
                        intent,
                        after_reconnect: true,
                    }),
                };
                self.publish();
                self.spawn_acquire();
            }
            None => {
                info!("Reconnected");
                self.phase = Phase::Standby { resuming: None };
                self.publish();
                self.deps.notifier.notify("Reconnected", Severity::Success);
            }
        }
    }
}
