use clap::Args;
use std::time::Duration;
use stream_retry::RetryPolicy;

/// How hard to try when provisioning topics at startup.
#[derive(Debug, Clone, Args)]
pub struct ProvisioningOpts {
    /// Attempts for each topic creation before giving up
    #[arg(
        long = "topic-retry-attempts",
        env = "KAFKA_TOPIC_RETRY_ATTEMPTS",
        default_value_t = 10
    )]
    pub retry_attempts: u32,

    /// Sleep before the first retry; doubles after every further failure
    #[arg(
        long = "topic-retry-backoff-ms",
        env = "KAFKA_TOPIC_RETRY_BACKOFF_MS",
        default_value_t = 1000
    )]
    pub retry_backoff_ms: u64,
}

impl ProvisioningOpts {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }
}

impl Default for ProvisioningOpts {
    fn default() -> Self {
        Self {
            retry_attempts: 10,
            retry_backoff_ms: 1000,
        }
    }
}
