//! In-memory backend with per-bunny fine-grained locking.
//!
//! [`MemoryStore`] keeps bunnies in a `HashMap` where each entry is
//! individually protected by a [`tokio::sync::RwLock`], so concurrent
//! happiness writes on different bunnies never contend and writes on the
//! same bunny are serialized. The ledger keeps events in append order plus
//! a play-pair index that answers repeat-play lookups in O(1).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{BunnyStore, ConfigStore, EventStore, HappinessWrite};
use crate::domain::{
    Bunny, BunnyEvent, BunnyId, BunnyProfileUpdate, EventDetails, EventId, Happiness,
    NewBunnyEvent, PointsConfig,
};
use crate::error::HappinessError;

/// Unordered pair of bunnies used as the play index key.
type PlayPair = (BunnyId, BunnyId);

fn play_pair(a: BunnyId, b: BunnyId) -> PlayPair {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Debug, Default)]
struct Ledger {
    /// Events in append order.
    events: Vec<BunnyEvent>,
    /// Number of play events per unordered pair.
    plays: HashMap<PlayPair, usize>,
}

impl Ledger {
    fn sorted(mut events: Vec<BunnyEvent>) -> Vec<BunnyEvent> {
        // Stable: equal timestamps keep append order.
        events.sort_by_key(|e| e.timestamp);
        events
    }
}

/// Process-local storage for bunnies, events and the points table.
///
/// # Concurrency
///
/// - Multiple tasks may read the same bunny concurrently.
/// - Writes to different bunnies are concurrent.
/// - Writes to the same bunny are serialized.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bunnies: RwLock<HashMap<BunnyId, Arc<RwLock<Bunny>>>>,
    ledger: RwLock<Ledger>,
    config: RwLock<Option<PointsConfig>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, id: BunnyId) -> Result<Arc<RwLock<Bunny>>, HappinessError> {
        let map = self.bunnies.read().await;
        map.get(&id)
            .cloned()
            .ok_or(HappinessError::BunnyNotFound(id))
    }

    /// Returns the number of bunnies in the registry.
    pub async fn len(&self) -> usize {
        self.bunnies.read().await.len()
    }

    /// Returns `true` if the registry holds no bunnies.
    pub async fn is_empty(&self) -> bool {
        self.bunnies.read().await.is_empty()
    }
}

#[async_trait]
impl BunnyStore for MemoryStore {
    async fn insert_bunny(&self, bunny: Bunny) -> Result<(), HappinessError> {
        let id = bunny.id;
        let mut map = self.bunnies.write().await;
        if map.contains_key(&id) {
            return Err(HappinessError::InvalidOperation(format!(
                "bunny {id} already exists"
            )));
        }
        map.insert(id, Arc::new(RwLock::new(bunny)));
        Ok(())
    }

    async fn get_bunny(&self, id: BunnyId) -> Result<Option<Bunny>, HappinessError> {
        let entry = self.bunnies.read().await.get(&id).cloned();
        match entry {
            Some(lock) => Ok(Some(lock.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_bunnies(&self) -> Result<Vec<Bunny>, HappinessError> {
        let map = self.bunnies.read().await;
        let mut bunnies = Vec::with_capacity(map.len());
        for entry in map.values() {
            bunnies.push(entry.read().await.clone());
        }
        bunnies.sort_by_key(|b| (b.created_at, b.id));
        Ok(bunnies)
    }

    async fn update_profile(
        &self,
        id: BunnyId,
        update: &BunnyProfileUpdate,
    ) -> Result<Bunny, HappinessError> {
        let lock = self.entry(id).await?;
        let mut bunny = lock.write().await;
        update.apply_to(&mut bunny, Utc::now());
        Ok(bunny.clone())
    }

    async fn set_happiness(
        &self,
        id: BunnyId,
        value: Happiness,
    ) -> Result<HappinessWrite, HappinessError> {
        let lock = self.entry(id).await?;
        let mut bunny = lock.write().await;
        let old = bunny.happiness;
        bunny.happiness = value;
        bunny.touch(Utc::now());
        Ok(HappinessWrite { old, new: value })
    }

    async fn adjust_happiness(
        &self,
        id: BunnyId,
        delta: i64,
    ) -> Result<HappinessWrite, HappinessError> {
        let lock = self.entry(id).await?;
        let mut bunny = lock.write().await;
        let old = bunny.happiness;
        bunny.happiness = old.apply(delta);
        bunny.touch(Utc::now());
        Ok(HappinessWrite {
            old,
            new: bunny.happiness,
        })
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append_event(&self, event: NewBunnyEvent) -> Result<BunnyEvent, HappinessError> {
        let event = event.into_event(EventId::new());
        let mut ledger = self.ledger.write().await;
        if let EventDetails::Playing(play) = event.details {
            *ledger
                .plays
                .entry(play_pair(event.bunny_id, play.playmate_bunny_id))
                .or_default() += 1;
        }
        ledger.events.push(event.clone());
        Ok(event)
    }

    async fn remove_event(&self, id: EventId) -> Result<(), HappinessError> {
        let mut ledger = self.ledger.write().await;
        let position = ledger
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or(HappinessError::EventNotFound(id))?;
        let removed = ledger.events.remove(position);
        if let EventDetails::Playing(play) = removed.details {
            let key = play_pair(removed.bunny_id, play.playmate_bunny_id);
            if let Some(count) = ledger.plays.get_mut(&key) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ledger.plays.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn list_events_for_bunny(
        &self,
        id: BunnyId,
    ) -> Result<Vec<BunnyEvent>, HappinessError> {
        let ledger = self.ledger.read().await;
        let events = ledger
            .events
            .iter()
            .filter(|e| e.involves(id))
            .cloned()
            .collect();
        Ok(Ledger::sorted(events))
    }

    async fn list_events(&self) -> Result<Vec<BunnyEvent>, HappinessError> {
        let ledger = self.ledger.read().await;
        Ok(Ledger::sorted(ledger.events.clone()))
    }

    async fn has_played_together(&self, a: BunnyId, b: BunnyId) -> Result<bool, HappinessError> {
        let ledger = self.ledger.read().await;
        Ok(ledger.plays.contains_key(&play_pair(a, b)))
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load_config(&self) -> Result<Option<PointsConfig>, HappinessError> {
        Ok(*self.config.read().await)
    }

    async fn save_config(&self, config: PointsConfig) -> Result<(), HappinessError> {
        *self.config.write().await = Some(config);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{FoodType, NewBunny};

    fn make_bunny(name: &str, happiness: i64) -> Bunny {
        let Ok(new) = NewBunny::parse(name, None, Some(Happiness::clamped(happiness))) else {
            panic!("valid bunny");
        };
        Bunny::from_new(new, Utc::now())
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = MemoryStore::new();
        let bunny = make_bunny("Clover", 50);
        let id = bunny.id;

        assert!(store.insert_bunny(bunny).await.is_ok());
        let Ok(Some(fetched)) = store.get_bunny(id).await else {
            panic!("bunny not found");
        };
        assert_eq!(fetched.name, "Clover");
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let store = MemoryStore::new();
        assert!(matches!(store.get_bunny(BunnyId::new()).await, Ok(None)));
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = MemoryStore::new();
        let bunny = make_bunny("Clover", 50);
        let _ = store.insert_bunny(bunny.clone()).await;
        assert!(store.insert_bunny(bunny).await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn adjust_clamps_and_reports_applied_delta() {
        let store = MemoryStore::new();
        let bunny = make_bunny("Clover", 99);
        let id = bunny.id;
        let _ = store.insert_bunny(bunny).await;

        let Ok(write) = store.adjust_happiness(id, 2).await else {
            panic!("adjust failed");
        };
        assert_eq!(write.new, Happiness::MAX);
        assert_eq!(write.applied_delta(), 1);
    }

    #[tokio::test]
    async fn adjust_missing_bunny_is_not_found() {
        let store = MemoryStore::new();
        let result = store.adjust_happiness(BunnyId::new(), 1).await;
        assert!(matches!(result, Err(HappinessError::BunnyNotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_adjustments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let bunny = make_bunny("Clover", 0);
        let id = bunny.id;
        let _ = store.insert_bunny(bunny).await;

        let mut handles = Vec::new();
        for _ in 0..40 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.adjust_happiness(id, 2).await }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let Ok(Some(bunny)) = store.get_bunny(id).await else {
            panic!("bunny not found");
        };
        assert_eq!(bunny.happiness.get(), 80);
    }

    #[tokio::test]
    async fn play_index_is_symmetric_and_compensable() {
        let store = MemoryStore::new();
        let a = BunnyId::new();
        let b = BunnyId::new();
        assert!(matches!(store.has_played_together(a, b).await, Ok(false)));

        let Ok(event) = store
            .append_event(NewBunnyEvent::playing(a, b, false, 2))
            .await
        else {
            panic!("append failed");
        };
        assert!(matches!(store.has_played_together(b, a).await, Ok(true)));

        assert!(store.remove_event(event.id).await.is_ok());
        assert!(matches!(store.has_played_together(a, b).await, Ok(false)));
        assert!(store.remove_event(event.id).await.is_err());
    }

    #[tokio::test]
    async fn history_includes_plays_as_playmate() {
        let store = MemoryStore::new();
        let a = BunnyId::new();
        let b = BunnyId::new();
        let _ = store
            .append_event(NewBunnyEvent::eating(a, FoodType::Carrot, 3))
            .await;
        let _ = store
            .append_event(NewBunnyEvent::playing(a, b, false, 2))
            .await;

        let Ok(for_b) = store.list_events_for_bunny(b).await else {
            panic!("list failed");
        };
        assert_eq!(for_b.len(), 1);

        let Ok(for_a) = store.list_events_for_bunny(a).await else {
            panic!("list failed");
        };
        assert_eq!(for_a.len(), 2);
    }

    #[tokio::test]
    async fn config_starts_empty_and_is_replaced() {
        let store = MemoryStore::new();
        assert!(matches!(store.load_config().await, Ok(None)));

        let config = PointsConfig {
            lettuce: 9,
            ..PointsConfig::default()
        };
        let _ = store.save_config(config).await;
        assert!(matches!(store.load_config().await, Ok(Some(c)) if c.lettuce == 9));
    }
}
