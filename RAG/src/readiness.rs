use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Calls `check` until it yields a value or the policy's timeout passes.
pub async fn poll_until<T, F, Fut>(what: &str, policy: PollPolicy, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(value) = check().await? {
            log::debug!("{} after {} attempt(s)", what, attempts);
            return Ok(value);
        }

        if started.elapsed() >= policy.timeout {
            return Err(anyhow::anyhow!(
                "timed out after {:?} waiting until {}",
                policy.timeout,
                what
            ));
        }

        sleep(policy.interval).await;
    }
}
