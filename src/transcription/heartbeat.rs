//! Heartbeat liveness monitor
//!
//! Every interval a ping is sent and a watchdog is armed. Any inbound traffic
//! (messages, protocol-level ping/pong) counts as proof of life and disarms
//! the watchdog. If the watchdog fires with no traffic since the ping, the
//! link is declared dead.

use super::timers::{TimerKind, Timers};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Liveness {
    Alive,
    Dead,
}

#[derive(Debug)]
pub(crate) struct HeartbeatMonitor {
    interval: Duration,
    watchdog: Duration,
    running: bool,
    last_traffic: Option<Instant>,
    ping_sent_at: Option<Instant>,
}

impl HeartbeatMonitor {
    pub(crate) fn new(interval: Duration, watchdog: Duration) -> Self {
        Self {
            interval,
            watchdog,
            running: false,
            last_traffic: None,
            ping_sent_at: None,
        }
    }

    pub(crate) fn start(&mut self, epoch: u64, timers: &mut Timers) {
        self.stop(timers);
        self.running = true;
        self.last_traffic = Some(Instant::now());
        timers.arm(epoch, TimerKind::HeartbeatTick, self.interval);
        debug!(interval_secs = self.interval.as_secs(), "Heartbeat started");
    }

    pub(crate) fn stop(&mut self, timers: &mut Timers) {
        timers.cancel(TimerKind::HeartbeatTick);
        timers.cancel(TimerKind::HeartbeatWatchdog);
        self.running = false;
        self.ping_sent_at = None;
    }

    /// Interval elapsed; returns true if a ping should be sent now
    pub(crate) fn on_tick(&mut self, epoch: u64, timers: &mut Timers, link_open: bool) -> bool {
        if !self.running {
            return false;
        }
        timers.arm(epoch, TimerKind::HeartbeatTick, self.interval);
        if !link_open {
            return false;
        }
        self.ping_sent_at = Some(Instant::now());
        timers.arm(epoch, TimerKind::HeartbeatWatchdog, self.watchdog);
        true
    }

    pub(crate) fn record_traffic(&mut self, timers: &mut Timers) {
        self.last_traffic = Some(Instant::now());
        if self.ping_sent_at.take().is_some() {
            timers.cancel(TimerKind::HeartbeatWatchdog);
        }
    }

    pub(crate) fn on_watchdog(&mut self) -> Liveness {
        let Some(ping_sent_at) = self.ping_sent_at.take() else {
            return Liveness::Alive;
        };
        if !self.running {
            return Liveness::Alive;
        }
        match self.last_traffic {
            Some(seen) if seen >= ping_sent_at => Liveness::Alive,
            _ => {
                warn!(
                    waited_secs = ping_sent_at.elapsed().as_secs(),
                    "No response to heartbeat"
                );
                Liveness::Dead
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn monitor() -> HeartbeatMonitor {
        HeartbeatMonitor::new(Duration::from_secs(30), Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn silent_link_is_declared_dead() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = Timers::new(tx);
        let mut heartbeat = monitor();

        heartbeat.start(1, &mut timers);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(heartbeat.on_tick(1, &mut timers, true));
        assert!(timers.is_armed(TimerKind::HeartbeatWatchdog));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(heartbeat.on_watchdog(), Liveness::Dead);
    }

    #[tokio::test(start_paused = true)]
    async fn traffic_after_ping_disarms_watchdog() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = Timers::new(tx);
        let mut heartbeat = monitor();

        heartbeat.start(1, &mut timers);
        assert!(heartbeat.on_tick(1, &mut timers, true));
        tokio::time::advance(Duration::from_secs(2)).await;
        heartbeat.record_traffic(&mut timers);

        assert!(!timers.is_armed(TimerKind::HeartbeatWatchdog));
        assert_eq!(heartbeat.on_watchdog(), Liveness::Alive);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_link_skips_ping_but_keeps_ticking() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = Timers::new(tx);
        let mut heartbeat = monitor();

        heartbeat.start(1, &mut timers);
        assert!(!heartbeat.on_tick(1, &mut timers, false));
        assert!(timers.is_armed(TimerKind::HeartbeatTick));
        assert!(!timers.is_armed(TimerKind::HeartbeatWatchdog));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_monitor_does_nothing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = Timers::new(tx);
        let mut heartbeat = monitor();

        heartbeat.start(1, &mut timers);
        heartbeat.stop(&mut timers);
        assert!(!timers.is_armed(TimerKind::HeartbeatTick));
        assert!(!heartbeat.on_tick(1, &mut timers, true));
        assert_eq!(heartbeat.on_watchdog(), Liveness::Alive);
    }
}
