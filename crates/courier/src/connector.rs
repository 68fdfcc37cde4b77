//! The application-facing connector.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ConnectorConfig;
use crate::dispatch::{log_fault, ErrorReporter, LoopState, SharedToken, Sweeper};
use crate::error::ConnectorError;
use crate::payload::Payload;
use crate::registry::{TopicHandler, TopicRegistry};
use crate::transport::HttpTransport;

/// Driver for one topic service: owns the registry, the subscription token and
/// the background sweep.
///
/// Dropping the connector cancels the sweep.
pub struct Connector<P: Payload = Value> {
    config: ConnectorConfig,
    transport: Arc<HttpTransport>,
    registry: Arc<TopicRegistry<P>>,
    token: SharedToken,
    reporter: ErrorReporter,
    state: AtomicU8,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P: Payload> Connector<P> {
    /// Create a connector with an initial topic set. The topics are installed
    /// locally, without subscribing.
    pub fn new(config: ConnectorConfig, topics: HashMap<String, TopicHandler<P>>) -> Self {
        Self::builder(config).topics(topics).build()
    }

    pub fn builder(config: ConnectorConfig) -> ConnectorBuilder<P> {
        ConnectorBuilder {
            config,
            topics: HashMap::new(),
            reporter: None,
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Token from the most recent successful subscription.
    pub fn subscription_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Registered topic names, in no particular order.
    pub fn topics(&self) -> Vec<String> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &TopicRegistry<P> {
        &self.registry
    }

    /// Current lifecycle state. A sweep task that has ended for any reason
    /// counts as `Stopped`.
    pub fn state(&self) -> LoopState {
        match LoopState::from_u8(self.state.load(Ordering::Acquire)) {
            LoopState::Running if self.cancel.is_cancelled() || self.task_finished() => {
                LoopState::Stopped
            }
            state => state,
        }
    }

    fn task_finished(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(JoinHandle::is_finished)
    }

    /// Register a handler for `topic`.
    ///
    /// A topic not yet in the registry is subscribed on the service first; the
    /// handler is installed only if that succeeds. Registering a known topic
    /// again just replaces its handler.
    #[tracing::instrument(skip(self, handler))]
    pub async fn register_topic(
        &self,
        topic: &str,
        handler: TopicHandler<P>,
    ) -> Result<(), ConnectorError> {
        if !self.registry.contains(topic) {
            let token = self.transport.subscribe(topic).await?;
            *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        }

        if self.registry.insert(topic, handler) {
            info!(topic, "Handler replaced");
        }
        Ok(())
    }

    /// Replace the whole registry. No subscription calls are made; topics the
    /// service does not know simply fail to pull.
    pub fn bulk_register_topics(&self, topics: HashMap<String, TopicHandler<P>>) {
        info!(count = topics.len(), "Replacing topic registry");
        self.registry.replace_all(topics);
    }

    /// Remove a topic locally. Messages already in flight for it are dropped.
    pub fn unregister_topic(&self, topic: &str) -> bool {
        self.registry.remove(topic)
    }

    /// Publish a message. Independent of the registry.
    pub async fn publish(&self, topic: &str, key: &str, value: P) -> Result<(), ConnectorError> {
        let value = value.into_wire()?;
        self.transport.publish(topic, key, value).await
    }

    /// Pull one message for `topic` with the current subscription token,
    /// without dispatching it.
    pub async fn pull(&self, topic: &str) -> Result<Option<(String, P)>, ConnectorError> {
        let token = self.subscription_token().unwrap_or_default();
        match self.transport.pull(topic, &token).await? {
            Some(message) => Ok(Some((message.key, P::from_wire(message.value)?))),
            None => Ok(None),
        }
    }

    /// Spawn the background sweep and return immediately.
    ///
    /// Only valid once, from `Idle`. Outside a tokio runtime this returns
    /// `NoRuntime` and the connector stays `Idle`.
    pub fn start(&self) -> Result<(), ConnectorError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ConnectorError::NoRuntime(e.to_string()))?;

        self.state
            .compare_exchange(
                LoopState::Idle as u8,
                LoopState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| ConnectorError::AlreadyStarted)?;

        let sweeper = Sweeper {
            registry: Arc::clone(&self.registry),
            transport: Arc::clone(&self.transport),
            token: Arc::clone(&self.token),
            reporter: Arc::clone(&self.reporter),
            period: self.config.poll_period,
        };

        let handle = runtime.spawn(sweeper.run(self.cancel.clone()));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!(
            url = %self.transport.base_url(),
            topics = self.registry.len(),
            "Connector started"
        );
        Ok(())
    }

    /// Token that stops the sweep when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the sweep and wait for the in-progress topic to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.state.store(LoopState::Stopped as u8, Ordering::Release);

        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Dispatch task ended abnormally: {}", e);
            }
        }
    }
}

impl<P: Payload> Drop for Connector<P> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<P: Payload> std::fmt::Debug for Connector<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("base_url", &self.transport.base_url())
            .field("state", &self.state())
            .field("topics", &self.registry)
            .finish()
    }
}

pub struct ConnectorBuilder<P> {
    config: ConnectorConfig,
    topics: HashMap<String, TopicHandler<P>>,
    reporter: Option<ErrorReporter>,
}

impl<P: Payload> ConnectorBuilder<P> {
    pub fn topic(mut self, name: impl Into<String>, handler: TopicHandler<P>) -> Self {
        self.topics.insert(name.into(), handler);
        self
    }

    pub fn topics(mut self, topics: HashMap<String, TopicHandler<P>>) -> Self {
        self.topics.extend(topics);
        self
    }

    /// Observer for faults in the background sweep. Defaults to logging them.
    pub fn error_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn build(self) -> Connector<P> {
        let config = self.config.normalized();
        let transport = HttpTransport::new(&config.base_url, config.request_timeout);

        Connector {
            transport: Arc::new(transport),
            registry: Arc::new(TopicRegistry::from_map(self.topics)),
            token: Arc::new(RwLock::new(None)),
            reporter: self.reporter.unwrap_or_else(|| Arc::new(log_fault)),
            state: AtomicU8::new(LoopState::Idle as u8),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::handler;

    #[test]
    fn test_initial_topics_installed_locally() {
        let config = ConnectorConfig::new("http://localhost:7070/");
        let connector: Connector = Connector::builder(config)
            .topic("test", handler(|_, _| {}))
            .build();

        assert_eq!(connector.base_url(), "http://localhost:7070");
        assert_eq!(connector.topics(), vec!["test".to_string()]);
        assert_eq!(connector.state(), LoopState::Idle);
        assert!(connector.subscription_token().is_none());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let connector: Connector<String> =
            Connector::new(ConnectorConfig::default(), HashMap::new());

        connector.start().unwrap();
        assert_eq!(connector.state(), LoopState::Running);
        assert!(matches!(connector.start(), Err(ConnectorError::AlreadyStarted)));

        connector.shutdown().await;
        assert_eq!(connector.state(), LoopState::Stopped);
        assert!(matches!(connector.start(), Err(ConnectorError::AlreadyStarted)));
    }

    #[test]
    fn test_start_outside_runtime_stays_idle() {
        let connector: Connector = Connector::new(ConnectorConfig::default(), HashMap::new());

        assert!(matches!(connector.start(), Err(ConnectorError::NoRuntime(_))));
        assert_eq!(connector.state(), LoopState::Idle);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            connector.start().unwrap();
            assert_eq!(connector.state(), LoopState::Running);
            connector.shutdown().await;
        });
    }

    #[tokio::test]
    async fn test_external_cancel_reports_stopped() {
        let connector: Connector = Connector::new(ConnectorConfig::default(), HashMap::new());
        connector.start().unwrap();

        connector.cancellation_token().cancel();
        assert_eq!(connector.state(), LoopState::Stopped);
        connector.shutdown().await;
    }

    #[test]
    fn test_bulk_register_replaces_initial_set() {
        let connector: Connector = Connector::builder(ConnectorConfig::default())
            .topic("a", handler(|_, _| {}))
            .build();

        let mut next = HashMap::new();
        next.insert("b".to_string(), handler(|_, _| {}));
        connector.bulk_register_topics(next);

        assert_eq!(connector.topics(), vec!["b".to_string()]);
        assert!(connector.unregister_topic("b"));
        assert!(connector.topics().is_empty());
    }
}
