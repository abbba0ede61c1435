//! Correlation registry: outstanding calls keyed by request id.

use crate::error::{HostError, HostErrorKind};
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};
use turnstile_protocol::RequestId;

/// Outcome delivered to a waiting caller.
pub type Settlement<T> = Result<T, HostError>;

/// Maps outstanding request ids to the continuation waiting on them.
///
/// Ids come from a monotonically increasing counter, so an id is never
/// handed out twice while an earlier holder is still pending.
#[derive(Debug)]
pub struct CorrelationRegistry<T> {
    next_id: RequestId,
    pending: HashMap<RequestId, oneshot::Sender<Settlement<T>>>,
}

impl<T> CorrelationRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: HashMap::new(),
        }
    }

    /// Allocates a fresh id and the receiver its settlement will arrive on.
    #[instrument(skip(self), fields(pending = self.pending.len()))]
    pub fn register(&mut self) -> (RequestId, oneshot::Receiver<Settlement<T>>) {
        let mut id = self.next_id;
        while self.pending.contains_key(&id) {
            id = id.wrapping_add(1);
        }
        self.next_id = id.wrapping_add(1);

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        debug!(request_id = id, "Registered pending request");
        (id, rx)
    }

    /// Removes the entry for `id` and fulfills it.
    ///
    /// # Errors
    ///
    /// Returns [`HostErrorKind::OrphanResponse`] if nothing is pending under
    /// `id`. No entry is created in that case.
    #[instrument(skip(self, outcome), fields(ok = outcome.is_ok()))]
    pub fn settle(&mut self, id: RequestId, outcome: Settlement<T>) -> Result<(), HostError> {
        let Some(waiter) = self.pending.remove(&id) else {
            warn!(request_id = id, "Response for unknown request id");
            return Err(HostErrorKind::OrphanResponse(id).into());
        };
        if waiter.send(outcome).is_err() {
            debug!(request_id = id, "Caller stopped waiting before settlement");
        }
        Ok(())
    }

    /// Rejects every pending entry with `kind`. Returns how many were rejected.
    #[instrument(skip(self))]
    pub fn reject_all(&mut self, kind: HostErrorKind) -> usize {
        let count = self.pending.len();
        for (id, waiter) in self.pending.drain() {
            debug!(request_id = id, "Rejecting pending request");
            let _ = waiter.send(Err(HostError::new(kind.clone())));
        }
        count
    }

    /// Returns true if `id` is still waiting on a response.
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no calls are outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for CorrelationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ContextKind;

    #[test]
    fn test_ids_are_unique_while_pending() {
        let mut registry = CorrelationRegistry::<u32>::new();
        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_settle_removes_and_fulfills() {
        let mut registry = CorrelationRegistry::<u32>::new();
        let (id, mut rx) = registry.register();
        registry.settle(id, Ok(42)).expect("Settle");
        assert!(!registry.is_pending(id));
        assert_eq!(rx.try_recv().expect("Settled").expect("Ok"), 42);
    }

    #[test]
    fn test_unknown_id_is_orphan_and_not_inserted() {
        let mut registry = CorrelationRegistry::<u32>::new();
        let err = registry.settle(99, Ok(1)).unwrap_err();
        assert_eq!(err.kind(), &HostErrorKind::OrphanResponse(99));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_second_settle_is_orphan() {
        let mut registry = CorrelationRegistry::<u32>::new();
        let (id, _rx) = registry.register();
        registry.settle(id, Ok(1)).expect("First settle");
        assert!(registry.settle(id, Ok(2)).is_err());
    }

    #[test]
    fn test_reject_all_drains() {
        let mut registry = CorrelationRegistry::<u32>::new();
        let (_, mut rx_a) = registry.register();
        let (_, mut rx_b) = registry.register();
        let rejected = registry.reject_all(HostErrorKind::ContextClosed(ContextKind::Engine));
        assert_eq!(rejected, 2);
        assert!(registry.is_empty());
        assert!(rx_a.try_recv().expect("Settled").is_err());
        assert!(rx_b.try_recv().expect("Settled").is_err());
    }
}
