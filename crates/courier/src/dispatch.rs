//! The sweep cycle.
//!
//! One background task per connector. Each sweep snapshots the registered
//! topic names, pulls at most one message per topic, and calls the topic's
//! current handler on the sweep task itself. After a full pass the task sleeps
//! for the polling period, or exits if the connector has been cancelled.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ConnectorError;
use crate::payload::Payload;
use crate::registry::TopicRegistry;
use crate::transport::{HttpTransport, WireMessage};

/// Dispatch loop lifecycle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, sweep not spawned yet
    Idle = 0,
    /// Sweep task active
    Running = 1,
    /// Cancelled; cannot be restarted
    Stopped = 2,
}

impl LoopState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LoopState::Idle,
            1 => LoopState::Running,
            _ => LoopState::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Running => "running",
            LoopState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failure inside the background sweep. The affected topic is skipped for
/// the current sweep only.
#[derive(Debug)]
pub enum SweepFault {
    /// Pull failed or the pulled value could not be decoded.
    Retrieval { topic: String, error: ConnectorError },
    /// The topic handler panicked.
    HandlerPanicked { topic: String, message: String },
}

impl SweepFault {
    pub fn topic(&self) -> &str {
        match self {
            SweepFault::Retrieval { topic, .. }
            | SweepFault::HandlerPanicked { topic, .. } => topic,
        }
    }
}

/// Observer for sweep faults.
pub type ErrorReporter = Arc<dyn Fn(&SweepFault) + Send + Sync>;

/// Reporter used when the application supplies none: log and move on.
pub fn log_fault(fault: &SweepFault) {
    match fault {
        SweepFault::Retrieval { topic, error } => {
            warn!(topic = %topic, "Pull failed: {}", error);
        }
        SweepFault::HandlerPanicked { topic, message } => {
            warn!(topic = %topic, "Handler panicked: {}", message);
        }
    }
}

pub(crate) type SharedToken = Arc<RwLock<Option<String>>>;

/// Outcome counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SweepStats {
    pub dispatched: usize,
    pub empty: usize,
    pub failed: usize,
    /// Pulled, but the topic was gone from the registry by dispatch time
    pub dropped: usize,
    pub panicked: usize,
}

pub(crate) struct Sweeper<P> {
    pub(crate) registry: Arc<TopicRegistry<P>>,
    pub(crate) transport: Arc<HttpTransport>,
    pub(crate) token: SharedToken,
    pub(crate) reporter: ErrorReporter,
    pub(crate) period: Duration,
}

impl<P: Payload> Sweeper<P> {
    fn current_token(&self) -> String {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }

    /// Hand a fault to the reporter. A panicking reporter is logged and
    /// otherwise ignored so the sweep keeps running.
    fn report(&self, fault: SweepFault) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (self.reporter)(&fault))) {
            warn!(
                topic = %fault.topic(),
                "Error reporter panicked: {}",
                panic_message(panic.as_ref())
            );
        }
    }

    /// One pass over every registered topic.
    pub(crate) async fn sweep_once(&self, cancel: &CancellationToken) -> SweepStats {
        let mut stats = SweepStats::default();
        let token = self.current_token();

        for topic in self.registry.snapshot() {
            if cancel.is_cancelled() {
                break;
            }

            let WireMessage { key, value } = match self.transport.pull(&topic, &token).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    stats.empty += 1;
                    continue;
                }
                Err(error) => {
                    stats.failed += 1;
                    self.report(SweepFault::Retrieval { topic, error });
                    continue;
                }
            };

            let value = match P::from_wire(value) {
                Ok(value) => value,
                Err(error) => {
                    stats.failed += 1;
                    self.report(SweepFault::Retrieval { topic, error });
                    continue;
                }
            };

            // Re-resolve: the topic may have been removed or re-registered
            // while the pull was in flight.
            let Some(handler) = self.registry.get(&topic) else {
                debug!(
                    topic = %topic,
                    key = %key,
                    "Topic unregistered during pull, dropping message"
                );
                stats.dropped += 1;
                continue;
            };

            match catch_unwind(AssertUnwindSafe(|| handler(key.as_str(), value))) {
                Ok(()) => stats.dispatched += 1,
                Err(panic) => {
                    stats.panicked += 1;
                    self.report(SweepFault::HandlerPanicked {
                        topic,
                        message: panic_message(panic.as_ref()),
                    });
                }
            }
        }

        stats
    }

    /// Sweep until cancelled.
    pub(crate) async fn run(self, cancel: CancellationToken) {
        info!(period = ?self.period, "Dispatch loop running");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let stats = self.sweep_once(&cancel).await;
            if stats.dispatched > 0 || stats.failed > 0 || stats.panicked > 0 {
                debug!(?stats, "Sweep complete");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.period) => {}
            }
        }

        info!("Dispatch loop stopped");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
