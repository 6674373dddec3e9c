//! Keep-alive scheduling while the connection is open.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Periodic keep-alive ticker.
///
/// Started when the connection reaches `Open` and dropped the moment it
/// leaves `Open`; dropping it is the only way to stop it. The first beat
/// fires one full period after start.
#[derive(Debug)]
pub(crate) struct Heartbeat {
    ticker: Interval,
}

impl Heartbeat {
    pub(crate) fn start(period: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { ticker }
    }

    /// Completes when the next keep-alive is due.
    pub(crate) async fn beat(&mut self) {
        self.ticker.tick().await;
    }
}
