//! Named, cancellable timers for the session engine
//!
//! Each armed timer sleeps on its own task and then posts a
//! [`LoopEvent::Timer`] carrying the epoch it was armed in and a unique token.
//! The engine only acts on a firing if [`Timers::claim`] accepts the token, so
//! a timer that was cancelled or re-armed after its sleep already completed is
//! ignored.

use super::engine::LoopEvent;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKind {
    Connect,
    Handshake,
    Configure,
    HeartbeatTick,
    HeartbeatWatchdog,
    ReconnectBackoff,
    MaxDuration,
}

struct ArmedTimer {
    token: u64,
    task: AbortHandle,
}

pub(crate) struct Timers {
    events: mpsc::UnboundedSender<LoopEvent>,
    armed: HashMap<TimerKind, ArmedTimer>,
    next_token: u64,
}

impl Timers {
    pub(crate) fn new(events: mpsc::UnboundedSender<LoopEvent>) -> Self {
        Self {
            events,
            armed: HashMap::new(),
            next_token: 0,
        }
    }

    /// Arm `kind` to fire after `after`, replacing any timer of the same kind
    pub(crate) fn arm(&mut self, epoch: u64, kind: TimerKind, after: Duration) {
        self.cancel(kind);
        self.next_token += 1;
        let token = self.next_token;
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(LoopEvent::Timer { epoch, kind, token });
        });

        trace!(?kind, token, ?after, "Timer armed");
        self.armed.insert(
            kind,
            ArmedTimer {
                token,
                task: task.abort_handle(),
            },
        );
    }

    pub(crate) fn cancel(&mut self, kind: TimerKind) {
        if let Some(timer) = self.armed.remove(&kind) {
            timer.task.abort();
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, timer) in self.armed.drain() {
            timer.task.abort();
        }
    }

    /// Accept a firing if it belongs to the currently armed timer of `kind`
    pub(crate) fn claim(&mut self, kind: TimerKind, token: u64) -> bool {
        match self.armed.get(&kind) {
            Some(timer) if timer.token == token => {
                self.armed.remove(&kind);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
