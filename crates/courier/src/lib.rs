//! courier - client driver for an HTTP pull-based pub/sub topic service
//!
//! The driver subscribes to named topics, publishes messages, and runs a
//! background sweep that pulls pending messages for every registered topic and
//! hands each one to that topic's handler.
//!
//! # Service contract
//!
//! | Operation | Request | Success |
//! |---|---|---|
//! | Subscribe | `POST /subscribe`, body `["<topic>"]` | `201`, `{"token": "..."}` |
//! | Publish | `POST /publish?topicId=<topic>`, body `{"key": .., "value": ..}` | `201` |
//! | Pull | `GET /pull?topicId=<topic>&subscriberId=<token>` | `200` message, `204` empty |
//!
//! # Example
//!
//! ```rust,no_run
//! use courier::{handler, Connector, ConnectorConfig};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), courier::ConnectorError> {
//! let connector: Connector = Connector::builder(ConnectorConfig::new("http://localhost:7070"))
//!     .build();
//!
//! connector
//!     .register_topic(
//!         "orders",
//!         handler(|key: &str, value: serde_json::Value| println!("{key}: {value}")),
//!     )
//!     .await?;
//! connector.start()?;
//!
//! connector.publish("orders", "K1", json!({"qty": 2})).await?;
//! # connector.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod dispatch;
pub mod error;
pub mod payload;
pub mod registry;
pub mod trace;
pub mod transport;

pub use config::ConnectorConfig;
pub use connector::{Connector, ConnectorBuilder};
pub use dispatch::{log_fault, ErrorReporter, LoopState, SweepFault};
pub use error::ConnectorError;
pub use payload::Payload;
pub use registry::{handler, TopicHandler, TopicRegistry};
pub use transport::{HttpTransport, SubscriptionResponse, WireMessage};
