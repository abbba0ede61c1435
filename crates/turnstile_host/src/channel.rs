//! Request/response channel over serialized messages.
//!
//! Contexts never share memory. Every message is encoded to JSON text on
//! the way out and decoded on the way in, so nothing crossing a boundary
//! can alias state on the other side.

use crate::error::{HostError, HostErrorKind};
use crate::registry::CorrelationRegistry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, instrument, warn};
use turnstile_protocol::{Correlated, RequestId};

/// The isolated contexts the host talks to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, serde::Serialize, serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// Game rules evaluator.
    Engine,
    /// Per-player view and controls.
    Presentation,
}

/// One end of a bidirectional text pipe.
#[derive(Debug)]
pub struct Endpoint {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl Endpoint {
    /// Creates a connected pair. Text sent on one end arrives on the other.
    pub fn pair() -> (Endpoint, Endpoint) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Endpoint {
                outbound: a_tx,
                inbound: b_rx,
            },
            Endpoint {
                outbound: b_tx,
                inbound: a_rx,
            },
        )
    }

    /// Sends raw text. Returns false if the far end is gone.
    pub fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    /// Receives the next raw text, or `None` once the far end is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    /// Splits into the sending and receiving halves.
    pub fn split(
        self,
    ) -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        (self.outbound, self.inbound)
    }
}

/// Typed, fire-and-forget sender to a context.
#[derive(Debug, Clone)]
pub struct Outbox<Out> {
    kind: ContextKind,
    sender: mpsc::UnboundedSender<String>,
    _out: PhantomData<fn(Out)>,
}

impl<Out: Serialize> Outbox<Out> {
    /// Wraps a raw sender.
    pub fn new(kind: ContextKind, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            kind,
            sender,
            _out: PhantomData,
        }
    }

    /// Serializes and sends a notification. No response is expected.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the context is gone.
    pub fn send(&self, message: &Out) -> Result<(), HostError> {
        let text = serde_json::to_string(message)?;
        self.sender
            .send(text)
            .map_err(|_| HostError::new(HostErrorKind::ContextClosed(self.kind)))
    }

    /// Context this outbox delivers to.
    pub fn kind(&self) -> ContextKind {
        self.kind
    }
}

/// Call-style channel: sends `Out` messages and awaits correlated `In`
/// responses.
///
/// Responses are pumped by the caller itself while it waits, so the
/// registry stays owned by whoever owns the channel.
#[derive(Debug)]
pub struct Channel<Out, In> {
    outbox: Outbox<Out>,
    inbound: mpsc::UnboundedReceiver<String>,
    registry: CorrelationRegistry<In>,
    closed: bool,
}

impl<Out, In> Channel<Out, In>
where
    Out: Serialize,
    In: DeserializeOwned + Correlated,
{
    /// Creates a channel over the host's end of a pipe.
    #[instrument(skip(endpoint))]
    pub fn new(kind: ContextKind, endpoint: Endpoint) -> Self {
        let (outbound, inbound) = endpoint.split();
        Self {
            outbox: Outbox::new(kind, outbound),
            inbound,
            registry: CorrelationRegistry::new(),
            closed: false,
        }
    }

    /// Fire-and-forget notification.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the context is gone.
    pub fn send(&self, message: &Out) -> Result<(), HostError> {
        self.outbox.send(message)
    }

    /// Sends a request built around a fresh correlation id and waits for
    /// the matching response.
    ///
    /// # Errors
    ///
    /// Returns [`HostErrorKind::EngineRejected`] if the response carries an
    /// error, or [`HostErrorKind::ContextClosed`] if the context goes away
    /// first.
    #[instrument(skip(self, build), fields(kind = %self.outbox.kind()))]
    pub async fn call(&mut self, build: impl FnOnce(RequestId) -> Out) -> Result<In, HostError> {
        let kind = self.outbox.kind();
        if self.closed {
            return Err(HostErrorKind::ContextClosed(kind).into());
        }

        let (id, mut waiter) = self.registry.register();
        if let Err(e) = self.outbox.send(&build(id)) {
            warn!(request_id = id, error = %e, "Failed to deliver request");
            self.teardown();
        }

        loop {
            match waiter.try_recv() {
                Ok(settlement) => return settlement,
                Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(HostErrorKind::ContextClosed(kind).into());
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }

            match self.inbound.recv().await {
                Some(text) => self.dispatch(&text),
                None => {
                    error!(%kind, "Context closed with calls outstanding");
                    self.teardown();
                }
            }
        }
    }

    /// Decodes one inbound message and settles its pending call.
    fn dispatch(&mut self, text: &str) {
        let response: In = match serde_json::from_str(text) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable response");
                return;
            }
        };
        let id = response.correlation_id();
        let outcome = match response.failure() {
            Some(reason) => Err(HostError::new(HostErrorKind::EngineRejected(
                reason.to_string(),
            ))),
            None => Ok(response),
        };
        // Orphans are logged by the registry and otherwise ignored.
        if self.registry.settle(id, outcome).is_ok() {
            debug!(request_id = id, "Settled response");
        }
    }

    /// Rejects every outstanding call and refuses new ones.
    #[instrument(skip(self), fields(kind = %self.outbox.kind()))]
    pub fn teardown(&mut self) -> usize {
        self.closed = true;
        let kind = self.outbox.kind();
        self.registry.reject_all(HostErrorKind::ContextClosed(kind))
    }

    /// Number of calls awaiting a response.
    pub fn pending(&self) -> usize {
        self.registry.len()
    }
}
