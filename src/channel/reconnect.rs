//! Scheduling of the single reconnection attempt after an unexpected close.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Sleep, sleep};

/// One pending reconnection attempt.
///
/// At most one exists at a time; it fires once and the driver replaces it
/// with a fresh schedule after the next close. Cancellation is dropping it,
/// which happens on `deactivate()` and on shutdown.
#[derive(Debug)]
pub(crate) struct RetryTimer {
    deadline: Pin<Box<Sleep>>,
}

impl RetryTimer {
    pub(crate) fn schedule(delay: Duration) -> Self {
        Self {
            deadline: Box::pin(sleep(delay)),
        }
    }

    /// Completes when the scheduled attempt is due.
    pub(crate) async fn fired(&mut self) {
        self.deadline.as_mut().await;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tokio::time;

    #[tokio::test(start_paused = true)]
    async fn fires_after_the_fixed_delay() {
        let mut retry = RetryTimer::schedule(Duration::from_secs(5));

        let early = time::timeout(Duration::from_secs(4), retry.fired()).await;
        assert!(early.is_err());

        let due = time::timeout(Duration::from_secs(2), retry.fired()).await;
        assert!(due.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_cancels_the_attempt() {
        let retry = RetryTimer::schedule(Duration::from_secs(5));
        drop(retry);

        // Nothing left to fire; advancing past the deadline is inert.
        time::advance(Duration::from_secs(10)).await;
    }
}
