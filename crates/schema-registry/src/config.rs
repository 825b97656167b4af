use clap::Args;
use std::time::Duration;
use stream_retry::RetryPolicy;

/// Schema registry connection settings.
#[derive(Debug, Clone, Args)]
pub struct SchemaRegistryConfig {
    /// Schema registry base URL
    #[arg(
        long = "schema-registry-url",
        env = "KAFKA_SCHEMA_REGISTRY_URL",
        default_value = "http://localhost:8081"
    )]
    pub url: String,

    /// Number of attempts for each registry call
    #[arg(
        long = "schema-registry-retry-attempts",
        env = "SCHEMA_REGISTRY_RETRY_ATTEMPTS",
        default_value_t = 10
    )]
    pub retry_attempts: u32,

    /// Sleep before the first retry; doubles after every further failure
    #[arg(
        long = "schema-registry-retry-backoff-ms",
        env = "SCHEMA_REGISTRY_RETRY_BACKOFF_MS",
        default_value_t = 1000
    )]
    pub retry_backoff_ms: u64,

    /// Per-request HTTP timeout
    #[arg(
        long = "schema-registry-timeout-ms",
        env = "SCHEMA_REGISTRY_TIMEOUT_MS",
        default_value_t = 10_000
    )]
    pub request_timeout_ms: u64,
}

impl SchemaRegistryConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for SchemaRegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8081".to_string(),
            retry_attempts: 10,
            retry_backoff_ms: 1000,
            request_timeout_ms: 10_000,
        }
    }
}
