//! Activity writer for backends without transactions.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;

use super::{ActivityStore, BunnyStore, EventStore, HappinessWrite, RecordedActivity};
use crate::domain::{BunnyEvent, BunnyId, NewBunnyEvent};
use crate::error::HappinessError;

/// Appends the event, credits the participants concurrently and undoes
/// whatever succeeded if any write fails.
///
/// Callers must hold the per-bunny locks of every participant, otherwise a
/// compensating write can interleave with another activity.
#[derive(Debug, Clone)]
pub struct CompensatingActivityStore {
    bunnies: Arc<dyn BunnyStore>,
    events: Arc<dyn EventStore>,
}

impl CompensatingActivityStore {
    /// Wraps the registry and ledger seams.
    #[must_use]
    pub fn new(bunnies: Arc<dyn BunnyStore>, events: Arc<dyn EventStore>) -> Self {
        Self { bunnies, events }
    }

    /// Reverts the writes that succeeded and removes the event.
    async fn compensate(&self, event: &BunnyEvent, writes: &[(BunnyId, HappinessWrite)]) {
        for (bunny_id, write) in writes {
            let delta = write.applied_delta();
            if delta == 0 {
                continue;
            }
            if let Err(err) = self.bunnies.adjust_happiness(*bunny_id, -delta).await {
                tracing::error!(%bunny_id, delta, error = %err, "compensating write failed");
            }
        }
        if let Err(err) = self.events.remove_event(event.id).await {
            tracing::error!(event_id = %event.id, error = %err, "compensating event removal failed");
        }
        tracing::warn!(event_id = %event.id, reverted = writes.len(), "activity rolled back");
    }
}

#[async_trait]
impl ActivityStore for CompensatingActivityStore {
    async fn record_activity(
        &self,
        event: NewBunnyEvent,
        participants: &[BunnyId],
    ) -> Result<RecordedActivity, HappinessError> {
        let delta = i64::from(event.points_earned);
        let event = self.events.append_event(event).await?;

        let results = join_all(
            participants
                .iter()
                .map(|id| self.bunnies.adjust_happiness(*id, delta)),
        )
        .await;

        let mut writes = Vec::with_capacity(results.len());
        let mut failure = None;
        for (id, result) in participants.iter().zip(results) {
            match result {
                Ok(write) => writes.push((*id, write)),
                Err(err) => {
                    tracing::error!(bunny_id = %id, event_id = %event.id, error = %err, "happiness write failed");
                    failure.get_or_insert(err);
                }
            }
        }

        if let Some(err) = failure {
            self.compensate(&event, &writes).await;
            return Err(err);
        }
        Ok(RecordedActivity { event, writes })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Bunny, Happiness, NewBunny};
    use crate::persistence::MemoryStore;
    use crate::service::test_support::FlakyStore;

    async fn insert(store: &dyn BunnyStore, name: &str, happiness: i64) -> Bunny {
        let Ok(new) = NewBunny::parse(name, None, Some(Happiness::clamped(happiness))) else {
            panic!("invalid test bunny");
        };
        let bunny = Bunny::from_new(new, chrono::Utc::now());
        let Ok(()) = store.insert_bunny(bunny.clone()).await else {
            panic!("insert failed");
        };
        bunny
    }

    #[tokio::test]
    async fn credits_every_participant() {
        let memory = Arc::new(MemoryStore::new());
        let writer = CompensatingActivityStore::new(memory.clone(), memory.clone());
        let a = insert(memory.as_ref(), "Clover", 10).await;
        let b = insert(memory.as_ref(), "Thumper", 98).await;

        let Ok(recorded) = writer
            .record_activity(NewBunnyEvent::playing(a.id, b.id, false, 4), &[a.id, b.id])
            .await
        else {
            panic!("record failed");
        };
        let news: Vec<u8> = recorded.writes.iter().map(|(_, w)| w.new.get()).collect();
        assert_eq!(news, vec![14, 100]);
        assert!(matches!(memory.list_events().await, Ok(e) if e.len() == 1));
    }

    #[tokio::test]
    async fn failed_write_undoes_event_and_clamped_credit() {
        let flaky = Arc::new(FlakyStore::default());
        let writer = CompensatingActivityStore::new(flaky.clone(), flaky.clone());
        let a = insert(flaky.as_ref(), "Clover", 99).await;
        let b = insert(flaky.as_ref(), "Thumper", 40).await;
        flaky.fail_writes_for(b.id).await;

        let result = writer
            .record_activity(NewBunnyEvent::playing(a.id, b.id, false, 2), &[a.id, b.id])
            .await;
        assert!(matches!(result, Err(HappinessError::Storage(_))));

        // 99 + 2 clamps to 100; only the applied 1 point is reverted.
        assert!(matches!(
            flaky.get_bunny(a.id).await,
            Ok(Some(bunny)) if bunny.happiness.get() == 99
        ));
        assert!(matches!(flaky.list_events().await, Ok(e) if e.is_empty()));
    }
}
