//! Bounded polling for proofs that become available eventually.

use std::{future::Future, time::Duration};

use tracing::{debug, warn};

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy)]
pub struct Poller {
    pub attempts: u32,
    pub interval: Duration,
}

impl Poller {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
        }
    }

    /// Same interval, a single attempt.
    pub fn once(self) -> Self {
        Self {
            attempts: 1,
            ..self
        }
    }

    /// Calls `fetch` until it yields a value or the attempts run out.
    /// Service errors count as a failed attempt.
    pub async fn poll<T, F, Fut>(&self, what: &str, mut fetch: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ServiceError>>,
    {
        for attempt in 1..=self.attempts {
            match fetch().await {
                Ok(Some(value)) => return Some(value),
                Ok(None) => debug!(what, attempt, "not available yet"),
                Err(e) => warn!(what, attempt, error = %e, "fetch failed"),
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_first_available_value() {
        let calls = &AtomicU32::new(0);
        let poller = Poller::new(5, Duration::from_secs(10));
        let value = poller
            .poll("vaa", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(if n >= 2 { Some(n) } else { None })
            })
            .await;
        assert_eq!(value, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_gives_up_after_attempts() {
        let calls = &AtomicU32::new(0);
        let poller = Poller::new(3, Duration::from_secs(10));
        let value: Option<u32> = poller
            .poll("exit proof", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::Decode("bad body".into()))
            })
            .await;
        assert_eq!(value, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(poller.once().attempts, 1);
    }
}
