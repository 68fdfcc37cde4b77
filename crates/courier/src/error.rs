//! Connector error taxonomy.
//!
//! Foreground calls (`register_topic`, `publish`, `start`) return these
//! directly. Failures inside the background sweep are wrapped in a
//! [`SweepFault`](crate::dispatch::SweepFault) and handed to the error reporter.

/// Errors that can occur when talking to the topic service.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The service could not be reached, or the request could not be built.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service did not accept a subscription.
    #[error("Subscription to '{topic}' failed{}: {reason}", fmt_status(.status))]
    RegistrationFailed {
        topic: String,
        status: Option<u16>,
        reason: String,
    },

    /// The service answered a publish with something other than 201.
    #[error("Publish to '{topic}' rejected (HTTP {status}): {body}")]
    PublishFailed {
        topic: String,
        status: u16,
        body: String,
    },

    /// A pull returned neither a message nor "no content".
    #[error("Pull from '{topic}' failed{}: {reason}", fmt_status(.status))]
    RetrievalFailed {
        topic: String,
        status: Option<u16>,
        reason: String,
    },

    /// `start` was called on a connector that is not idle.
    #[error("Dispatch loop already started")]
    AlreadyStarted,

    /// `start` was called outside a tokio runtime.
    #[error("No tokio runtime to run the dispatch loop: {0}")]
    NoRuntime(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl ConnectorError {
    /// True when the failure happened before the service produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, ConnectorError::Transport(_))
    }

    /// HTTP status observed from the service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ConnectorError::RegistrationFailed { status, .. }
            | ConnectorError::RetrievalFailed { status, .. } => *status,
            ConnectorError::PublishFailed { status, .. } => Some(*status),
            ConnectorError::Transport(_)
            | ConnectorError::AlreadyStarted
            | ConnectorError::NoRuntime(_) => None,
        }
    }
}
