//! Host-side liveness probing of a peer link.
//!
//! A link can be reported open long after the remote process is gone, for
//! example when a phone browser kills a background tab without closing its
//! connections. A [`Monitor`] bounds how long that goes unnoticed.
//!
//! Every interval the monitor asks its owner to send a `HEARTBEAT`, then
//! waits for the `HEARTBEAT_ACK`. At most one probe is outstanding: ticks
//! that come while waiting are skipped. If the deadline passes without an
//! acknowledgement the monitor reports [`Probe::Expired`] and its owner closes
//! the link. The worst-case detection time is one interval plus one deadline.
//!
//! The monitor owns its timers. Dropping it cancels them.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::util::{self, Timer};

/// What woke the monitor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Probe {
    /// The probe interval elapsed.
    Tick,

    /// The outstanding probe was not acknowledged in time.
    Expired,
}

/// What to do on a [`Probe::Tick`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Send a `HEARTBEAT`; the deadline is running.
    Send,

    /// A probe is still outstanding.
    Skip,

    /// The link is no longer open. The monitor should be discarded; the
    /// link's own close handling takes over.
    Stop,
}

#[derive(Debug)]
pub struct Monitor {
    interval: Interval,
    deadline: Timer,
    timeout: Duration,
}

impl Monitor {
    /// Arms a monitor. The first tick comes one `period` from now.
    ///
    /// # Arguments
    ///
    /// * `period` - Time between probes
    /// * `timeout` - Time the remote has to acknowledge a probe
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime, as the interval starts
    /// right away. Sessions only create monitors from within `recv`.
    #[must_use]
    pub fn new(period: Duration, timeout: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            interval,
            deadline: None,
            timeout,
        }
    }

    /// Whether a probe is outstanding.
    #[must_use]
    pub fn is_awaiting_ack(&self) -> bool {
        self.deadline.is_some()
    }

    /// Waits for the next tick or deadline expiry.
    ///
    /// When both are due, expiry wins. This is cancel safe.
    pub async fn next(&mut self) -> Probe {
        tokio::select! {
            biased;

            () = util::elapsed(&mut self.deadline) => {
                self.deadline = None;
                Probe::Expired
            }
            _ = self.interval.tick() => Probe::Tick,
        }
    }

    /// Decides what to do on a tick, given whether the link is still open.
    pub fn tick(&mut self, link_open: bool) -> Action {
        if !link_open {
            self.deadline = None;
            return Action::Stop;
        }

        if self.is_awaiting_ack() {
            return Action::Skip;
        }

        self.deadline = util::arm(self.timeout);
        Action::Send
    }

    /// Records a `HEARTBEAT_ACK`. Returns `false` for an acknowledgement
    /// without an outstanding probe, e.g. a duplicate.
    pub fn acknowledge(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(2000);

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let start = Instant::now();
        let mut monitor = Monitor::new(PERIOD, PERIOD);
        assert_eq!(monitor.next().await, Probe::Tick);
        assert_eq!(start.elapsed(), PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledged_probes_never_expire() {
        let mut monitor = Monitor::new(PERIOD, PERIOD);
        for _ in 0..5 {
            assert_eq!(monitor.next().await, Probe::Tick);
            assert_eq!(monitor.tick(true), Action::Send);
            time::advance(Duration::from_millis(500)).await;
            assert!(monitor.acknowledge());
        }
        assert!(!monitor.acknowledge());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_are_skipped_while_awaiting_ack() {
        let start = Instant::now();
        let mut monitor = Monitor::new(Duration::from_millis(500), PERIOD);

        assert_eq!(monitor.next().await, Probe::Tick);
        assert_eq!(monitor.tick(true), Action::Send);

        let mut skipped = 0;
        loop {
            match monitor.next().await {
                Probe::Tick => {
                    assert_eq!(monitor.tick(true), Action::Skip);
                    skipped += 1;
                }
                Probe::Expired => break,
            }
        }

        assert_eq!(skipped, 3);
        assert_eq!(start.elapsed(), Duration::from_millis(2500));
        assert!(!monitor.is_awaiting_ack());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_wins_over_simultaneous_tick() {
        let mut monitor = Monitor::new(PERIOD, PERIOD);
        assert_eq!(monitor.next().await, Probe::Tick);
        assert_eq!(monitor.tick(true), Action::Send);
        assert_eq!(monitor.next().await, Probe::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_link_stops_monitor() {
        let mut monitor = Monitor::new(PERIOD, PERIOD);
        assert_eq!(monitor.tick(false), Action::Stop);
        assert!(!monitor.is_awaiting_ack());
    }
}
