//! Change-notification fan-out.
//!
//! Every mutation in the service ends with one or more [`ChangeEvent`]s on
//! the [`EventBus`]. WebSocket connections hold a receiver each and filter
//! by their bunny subscriptions. Nothing is persisted here: a receiver that
//! falls behind the ring buffer loses the oldest notifications and must
//! re-read state over REST.

use tokio::sync::broadcast;

use super::ChangeEvent;

/// Fan-out of [`ChangeEvent`]s to every live receiver.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` notifications per
    /// receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Sends one notification and returns how many receivers got it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let event_type = event.event_type_str();
        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::trace!(event_type, receivers, "change published");
        receivers
    }

    /// Sends the notifications of one operation in order.
    ///
    /// Returns the number of notifications sent.
    pub fn publish_batch(&self, events: impl IntoIterator<Item = ChangeEvent>) -> usize {
        events.into_iter().map(|event| self.publish(event)).count()
    }

    /// Opens a receiver for notifications published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{BunnyId, Happiness, HappinessChangeReason};
    use chrono::Utc;

    fn changed(bunny_id: BunnyId, old: i64, new: i64) -> ChangeEvent {
        ChangeEvent::HappinessChanged {
            bunny_id,
            old_happiness: Happiness::clamped(old),
            new_happiness: Happiness::clamped(new),
            reason: HappinessChangeReason::Activity,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn nobody_listening_is_not_an_error() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(changed(BunnyId::new(), 1, 2)), 0);
    }

    #[tokio::test]
    async fn batch_keeps_operation_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let (clover, thumper) = (BunnyId::new(), BunnyId::new());

        let sent = bus.publish_batch([changed(clover, 10, 12), changed(thumper, 20, 22)]);
        assert_eq!(sent, 2);

        for expected in [clover, thumper] {
            let Ok(event) = rx.recv().await else {
                panic!("missing notification");
            };
            assert_eq!(event.bunny_id(), Some(expected));
        }
    }

    #[tokio::test]
    async fn slow_receiver_loses_oldest_notifications() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        let id = BunnyId::new();

        bus.publish_batch((0..3).map(|n| changed(id, n, n + 1)));

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        let Ok(ChangeEvent::HappinessChanged { old_happiness, .. }) = rx.recv().await else {
            panic!("expected the second change");
        };
        assert_eq!(old_happiness.get(), 1);
    }
}
