use std::time::Duration;
use tokio::time::Instant;

/// Holds the latest value until input has been quiet for `delay`.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending value and restart the quiet period.
    pub fn schedule(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.delay));
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Non-blocking poll for event loops that already tick on their own.
    pub fn try_next(&mut self) -> Option<T> {
        self.try_next_at(Instant::now())
    }

    pub fn try_next_at(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if *at <= now => self.cancel(),
            _ => None,
        }
    }

    /// Wait for the pending value to settle. Pending forever when nothing is scheduled.
    pub async fn next(&mut self) -> T {
        loop {
            match self.deadline() {
                Some(at) => {
                    tokio::time::sleep_until(at).await;
                    if let Some(v) = self.try_next() {
                        return v;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        }
    }
}
