//! Idle-read keepalive.
//!
//! The deadline moves forward on every received frame. When it passes, one
//! ping is due and the deadline re-arms a full interval later, so a silent
//! link sees one ping per interval and never a burst.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Keepalive {
    interval: Duration,
    deadline: Instant,
    pings_sent: u64,
}

impl Keepalive {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now() + interval,
            pings_sent: 0,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Any inbound frame (pong included) proves liveness.
    pub fn on_frame(&mut self) {
        self.deadline = Instant::now() + self.interval;
    }

    /// Called when the deadline fires. Returns true when a ping is due.
    pub fn on_idle(&mut self) -> bool {
        let now = Instant::now();
        if now < self.deadline {
            return false;
        }
        self.deadline = now + self.interval;
        self.pings_sent += 1;
        true
    }

    pub fn pings_sent(&self) -> u64 {
        self.pings_sent
    }
}
