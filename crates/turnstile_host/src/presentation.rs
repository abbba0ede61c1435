//! Outbound side of the presentation context.

use crate::channel::{ContextKind, Outbox};
use crate::error::HostError;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use turnstile_protocol::{GameUpdate, IntentId, Position, PresentationEvent};

/// Pushes events to the presentation surface.
///
/// Broadcasts can be suspended while history is being rebuilt; events sent
/// in the meantime are dropped; the full picture is re-pushed on resume.
/// Acks are never suspended.
#[derive(Debug)]
pub struct Broadcaster {
    outbox: Outbox<PresentationEvent>,
    suspended: bool,
    dropped: usize,
}

impl Broadcaster {
    /// Wraps the sender half of the presentation pipe.
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            outbox: Outbox::new(ContextKind::Presentation, sender),
            suspended: false,
            dropped: 0,
        }
    }

    /// Pushes `event` unless broadcasts are suspended.
    pub fn broadcast(&mut self, event: PresentationEvent) {
        if self.suspended {
            self.dropped += 1;
            return;
        }
        self.deliver(&event);
    }

    /// Sends the `messageProcessed` for intent `id`.
    #[instrument(skip(self, failure), fields(ok = failure.is_none()))]
    pub fn ack(&self, id: IntentId, failure: Option<&HostError>) {
        let error = failure.map(HostError::reason);
        self.deliver(&PresentationEvent::MessageProcessed { id, error });
    }

    fn deliver(&self, event: &PresentationEvent) {
        if let Err(e) = self.outbox.send(event) {
            warn!(error = %e, "Presentation unreachable");
        }
    }

    /// Stops broadcasting until [`resume`](Self::resume).
    pub fn suspend(&mut self) {
        self.suspended = true;
        self.dropped = 0;
    }

    /// Re-enables broadcasting. Returns how many events were dropped.
    pub fn resume(&mut self) -> usize {
        self.suspended = false;
        let dropped = std::mem::take(&mut self.dropped);
        if dropped > 0 {
            debug!(dropped, "Dropped broadcasts while suspended");
        }
        dropped
    }

    /// Returns true while broadcasts are suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}

/// Hook deciding which seat the viewer follows after a successful move.
///
/// Only affects what is displayed. Never touches session or history.
pub trait ViewerPolicy: Send + Sync {
    /// Returns the seat to switch to, or `None` to stay.
    fn after_move(
        &self,
        update: &GameUpdate,
        viewer: Option<Position>,
        manual_override: bool,
    ) -> Option<Position>;
}

/// Follows the first player whose turn it is, unless the viewer was picked
/// by hand.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSwitch;

impl ViewerPolicy for AutoSwitch {
    fn after_move(
        &self,
        update: &GameUpdate,
        viewer: Option<Position>,
        manual_override: bool,
    ) -> Option<Position> {
        if manual_override || update.game.is_finished() {
            return None;
        }
        update
            .game
            .current_players
            .first()
            .copied()
            .filter(|next| Some(*next) != viewer)
    }
}

/// Never switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct StayPut;

impl ViewerPolicy for StayPut {
    fn after_move(&self, _: &GameUpdate, _: Option<Position>, _: bool) -> Option<Position> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostErrorKind;

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<PresentationEvent> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).expect("Valid event"));
        }
        out
    }

    #[test]
    fn test_suspend_drops_broadcasts_but_not_acks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut broadcaster = Broadcaster::new(tx);

        broadcaster.suspend();
        assert!(broadcaster.is_suspended());
        broadcaster.broadcast(PresentationEvent::Users { users: Vec::new() });
        broadcaster.broadcast(PresentationEvent::Users { users: Vec::new() });
        broadcaster.ack("a".to_string(), None);
        broadcaster.ack("b".to_string(), Some(&HostErrorKind::NoGame.into()));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, PresentationEvent::MessageProcessed { .. })));
        assert!(matches!(
            &events[1],
            PresentationEvent::MessageProcessed { error: Some(_), .. }
        ));

        assert_eq!(broadcaster.resume(), 2);
        assert!(!broadcaster.is_suspended());
        broadcaster.broadcast(PresentationEvent::Users { users: Vec::new() });
        assert_eq!(drain(&mut rx).len(), 1);
    }
}
