/// Polling utilities for waiting on conditions with timeout
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::info;

use crate::error::{Error, Result};

/// Configuration for polling operations
pub struct PollingConfig {
    pub timeout: Duration,
    pub interval: Duration,
    pub description: String,
}

impl PollingConfig {
    /// Create a new polling configuration
    pub fn new(timeout: Duration, interval: Duration, description: impl Into<String>) -> Self {
        Self {
            timeout,
            interval,
            description: description.into(),
        }
    }

    /// Poll until condition is met or timeout
    ///
    /// The condition function should return:
    /// - Ok(Some(T)) when condition is met (returns T)
    /// - Ok(None) when condition is not yet met (continues polling)
    /// - Err(e) when an error occurs (stops polling and returns error)
    pub async fn poll<F, Fut, T>(&self, condition: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        info!("{}...", self.description);

        let start = Instant::now();

        loop {
            if let Some(value) = condition().await? {
                info!("✓ {}", self.description);
                return Ok(value);
            }

            if start.elapsed() > self.timeout {
                return Err(Error::Timeout {
                    secs: self.timeout.as_secs(),
                    description: self.description.clone(),
                });
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_polling_success() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let config = PollingConfig::new(
            Duration::from_secs(10),
            Duration::from_millis(10),
            "test polling",
        );

        let result = config
            .poll(|| {
                let c = counter_clone.clone();
                async move {
                    let val = c.fetch_add(1, Ordering::SeqCst);
                    if val >= 2 {
                        Ok(Some(val))
                    } else {
                        Ok(None)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_polling_timeout() {
        let config = PollingConfig::new(
            Duration::from_millis(50),
            Duration::from_millis(10),
            "test timeout",
        );

        let result = config.poll(|| async { Ok::<Option<()>, Error>(None) }).await;

        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_polling_error_stops() {
        let config = PollingConfig::new(
            Duration::from_secs(10),
            Duration::from_millis(10),
            "test error",
        );

        let result = config
            .poll(|| async {
                Err::<Option<()>, Error>(Error::NotFound {
                    path: "/lke/clusters/1/kubeconfig".to_string(),
                })
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
    }
}
