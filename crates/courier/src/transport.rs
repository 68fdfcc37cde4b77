//! HTTP calls to the topic service.
//!
//! Three stateless operations: subscribe, publish, pull. Each completes within
//! a single request/response exchange; any long-poll behavior belongs to the
//! service.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConnectorError;
use crate::trace::{current_traceparent, TRACEPARENT};

/// Body of a successful subscribe response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub token: String,
}

/// A message as carried on the wire, for both publish and pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

/// Thin HTTP client bound to one service base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn traced(&self, mut builder: RequestBuilder) -> RequestBuilder {
        builder = builder.timeout(self.timeout);
        if let Some(tp) = current_traceparent() {
            builder = builder.header(TRACEPARENT, tp);
        }
        builder
    }

    /// Establish a subscription for `topic` and return the subscriber token.
    ///
    /// Only `201 Created` counts as success. Transport failures are reported as
    /// `RegistrationFailed` too, with no status.
    #[tracing::instrument(skip(self), fields(courier.url = %self.base_url))]
    pub async fn subscribe(&self, topic: &str) -> Result<String, ConnectorError> {
        let failed = |status: Option<u16>, reason: String| ConnectorError::RegistrationFailed {
            topic: topic.to_string(),
            status,
            reason,
        };

        let response = self
            .traced(self.client.post(self.url("subscribe")))
            .json(&[topic])
            .send()
            .await
            .map_err(|e| failed(None, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(Some(status.as_u16()), body));
        }

        let parsed: SubscriptionResponse = response
            .json()
            .await
            .map_err(|e| {
                failed(
                    Some(status.as_u16()),
                    format!("Invalid subscribe response: {}", e),
                )
            })?;

        tracing::info!(topic, "Subscription established");
        Ok(parsed.token)
    }

    /// Publish one message to `topic`.
    ///
    /// A non-201 answer is `PublishFailed`; failing to send at all is
    /// `Transport`.
    #[tracing::instrument(skip(self, value), fields(courier.url = %self.base_url))]
    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        value: Value,
    ) -> Result<(), ConnectorError> {
        let body = WireMessage {
            key: key.to_string(),
            value,
        };

        let response = self
            .traced(self.client.post(self.url("publish")))
            .query(&[("topicId", topic)])
            .json(&body)
            .send()
            .await
            .map_err(|e| ConnectorError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::PublishFailed {
                topic: topic.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// Pull the next pending message for `topic`.
    ///
    /// `204 No Content` means the queue is empty and yields `Ok(None)`.
    #[tracing::instrument(skip(self, token), level = "debug")]
    pub async fn pull(
        &self,
        topic: &str,
        token: &str,
    ) -> Result<Option<WireMessage>, ConnectorError> {
        let failed = |status: Option<u16>, reason: String| ConnectorError::RetrievalFailed {
            topic: topic.to_string(),
            status,
            reason,
        };

        let response = self
            .traced(self.client.get(self.url("pull")))
            .query(&[("topicId", topic), ("subscriberId", token)])
            .send()
            .await
            .map_err(|e| failed(None, e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let message = response
                    .json::<WireMessage>()
                    .await
                    .map_err(|e| failed(Some(200), format!("Invalid message body: {}", e)))?;
                Ok(Some(message))
            }
            StatusCode::NO_CONTENT => {
                tracing::debug!(topic, "No pending message");
                Ok(None)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(failed(Some(status.as_u16()), body))
            }
        }
    }
}
