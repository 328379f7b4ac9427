//! Per-connection subscription manager.
//!
//! Tracks which bunny IDs a WebSocket client is subscribed to and
//! provides server-side event filtering.

use std::collections::HashSet;

use crate::domain::{BunnyId, ChangeEvent};

/// Manages the set of bunny subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed bunny IDs. If `subscribe_all` is true, this set is ignored.
    bunny_ids: HashSet<BunnyId>,
    /// Whether the client subscribes to all bunnies (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds bunny IDs to the subscription set. `"*"` enables the wildcard.
    pub fn subscribe(&mut self, ids: &[BunnyId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.bunny_ids.extend(ids.iter().copied());
    }

    /// Removes bunny IDs from the subscription set. `"*"` clears the
    /// wildcard.
    pub fn unsubscribe(&mut self, ids: &[BunnyId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.bunny_ids.remove(id);
        }
    }

    /// Returns `true` if the event should be forwarded to this client.
    ///
    /// Play activity matches a subscription to either participant. Global
    /// notifications (points table, bulk recalculation) reach every client
    /// with at least one subscription.
    #[must_use]
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if self.subscribe_all {
            return true;
        }
        match event {
            ChangeEvent::ActivityRecorded { event, .. } => {
                self.bunny_ids.iter().any(|id| event.involves(*id))
            }
            other => match other.bunny_id() {
                Some(id) => self.bunny_ids.contains(&id),
                None => !self.bunny_ids.is_empty(),
            },
        }
    }

    /// Returns the number of explicitly subscribed bunny IDs.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bunny_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{EventId, Happiness, NewBunnyEvent, PointsConfig};

    fn updated(bunny_id: BunnyId) -> ChangeEvent {
        ChangeEvent::BunnyUpdated {
            bunny_id,
            timestamp: Utc::now(),
        }
    }

    fn config_updated() -> ChangeEvent {
        ChangeEvent::PointsConfigUpdated {
            config: PointsConfig::default(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(&updated(BunnyId::new())));
        assert!(!mgr.matches(&config_updated()));
    }

    #[test]
    fn subscribe_specific_bunny() {
        let mut mgr = SubscriptionManager::new();
        let id = BunnyId::new();
        mgr.subscribe(&[id], false);
        assert!(mgr.matches(&updated(id)));
        assert!(!mgr.matches(&updated(BunnyId::new())));
    }

    #[test]
    fn wildcard_matches_everything() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[], true);
        assert!(mgr.matches(&updated(BunnyId::new())));
        assert!(mgr.matches(&config_updated()));
        mgr.unsubscribe(&[], true);
        assert!(!mgr.is_subscribed_all());
    }

    #[test]
    fn play_reaches_playmate_subscribers() {
        let mut mgr = SubscriptionManager::new();
        let playmate = BunnyId::new();
        mgr.subscribe(&[playmate], false);

        let event = NewBunnyEvent::playing(BunnyId::new(), playmate, false, 2)
            .into_event(EventId::new());
        assert!(mgr.matches(&ChangeEvent::ActivityRecorded {
            event,
            timestamp: Utc::now(),
        }));
    }

    #[test]
    fn global_events_need_some_subscription() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[BunnyId::new()], false);
        assert!(mgr.matches(&config_updated()));
        assert!(!mgr.matches(&ChangeEvent::HappinessChanged {
            bunny_id: BunnyId::new(),
            old_happiness: Happiness::MIN,
            new_happiness: Happiness::MAX,
            reason: crate::domain::HappinessChangeReason::Recalculation,
            timestamp: Utc::now(),
        }));
    }

    #[test]
    fn unsubscribe_removes_bunny() {
        let mut mgr = SubscriptionManager::new();
        let id = BunnyId::new();
        mgr.subscribe(&[id, BunnyId::new()], false);
        assert_eq!(mgr.count(), 2);
        mgr.unsubscribe(&[id], false);
        assert!(!mgr.matches(&updated(id)));
        assert_eq!(mgr.count(), 1);
    }
}
