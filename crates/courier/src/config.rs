//! Connector configuration.

use std::time::Duration;

/// Settings fixed for the lifetime of a connector.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Base URL of the topic service, without trailing slash.
    pub base_url: String,
    /// Pause between two sweeps over the registry.
    pub poll_period: Duration,
    /// Per-request timeout applied to every HTTP call.
    pub request_timeout: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7070".to_string(),
            poll_period: Duration::from_millis(30),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectorConfig {
    /// Create a config for the given service URL with default timings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
        .normalized()
    }

    pub fn with_poll_period(mut self, period: Duration) -> Self {
        self.poll_period = period;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub(crate) fn normalized(mut self) -> Self {
        let trimmed = self.base_url.trim_end_matches('/').len();
        self.base_url.truncate(trimmed);
        self
    }
}
