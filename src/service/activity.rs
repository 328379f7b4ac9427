//! Incremental update path: feeding and playing.
//!
//! Each activity appends one ledger event and adds its points to every
//! participant without replaying history. The storage layer makes the
//! event and the participant writes all-or-nothing.

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::HappinessService;
use crate::domain::{
    BunnyEvent, BunnyId, ChangeEvent, FoodType, Happiness, HappinessChangeReason, NewBunnyEvent,
};
use crate::error::HappinessError;
use crate::persistence::RecordedActivity;

/// New score of one participant after an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct HappinessUpdate {
    /// Participant.
    pub bunny_id: BunnyId,
    /// Score before the activity.
    pub previous: Happiness,
    /// Score after the activity.
    pub happiness: Happiness,
}

/// Result of a feed or play.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityOutcome {
    /// The persisted ledger event.
    pub event: BunnyEvent,
    /// New scores, actor first.
    pub updates: Vec<HappinessUpdate>,
}

impl ActivityOutcome {
    /// New score of `bunny_id`, if it took part.
    #[must_use]
    pub fn happiness_of(&self, bunny_id: BunnyId) -> Option<Happiness> {
        self.updates
            .iter()
            .find(|u| u.bunny_id == bunny_id)
            .map(|u| u.happiness)
    }
}

impl HappinessService {
    /// Feeds a bunny.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::BunnyNotFound`] if the bunny does not
    /// exist, or [`HappinessError::Storage`] if a write fails. A failed
    /// write leaves no trace.
    pub async fn feed(
        &self,
        bunny_id: BunnyId,
        food: FoodType,
    ) -> Result<ActivityOutcome, HappinessError> {
        let _guard = self.locks.acquire(&[bunny_id]).await;
        self.get_bunny(bunny_id).await?;

        let config = self.current_config().await?;
        let points = config.for_food(food);

        let outcome = self
            .record(NewBunnyEvent::eating(bunny_id, food, points), &[bunny_id])
            .await?;
        tracing::info!(%bunny_id, ?food, points, "bunny fed");
        Ok(outcome)
    }

    /// Records two bunnies playing together. Both earn the same points.
    ///
    /// The first play between a pair earns `playing`; any later play
    /// between them, initiated from either side, earns `repeat_playing`.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::InvalidOperation`] if `bunny_id` and
    /// `playmate_id` are the same, [`HappinessError::BunnyNotFound`] if
    /// either does not exist, or [`HappinessError::Storage`] if a write
    /// fails.
    pub async fn play(
        &self,
        bunny_id: BunnyId,
        playmate_id: BunnyId,
    ) -> Result<ActivityOutcome, HappinessError> {
        if bunny_id == playmate_id {
            return Err(HappinessError::InvalidOperation(
                "a bunny cannot play with itself".to_string(),
            ));
        }

        let _guard = self.locks.acquire(&[bunny_id, playmate_id]).await;
        tokio::try_join!(self.get_bunny(bunny_id), self.get_bunny(playmate_id))?;

        let (config, is_repeat_play) = tokio::try_join!(
            self.current_config(),
            self.storage.events.has_played_together(bunny_id, playmate_id),
        )?;
        let points = config.for_play(is_repeat_play);

        let outcome = self
            .record(
                NewBunnyEvent::playing(bunny_id, playmate_id, is_repeat_play, points),
                &[bunny_id, playmate_id],
            )
            .await?;
        tracing::info!(%bunny_id, %playmate_id, is_repeat_play, points, "bunnies played");
        Ok(outcome)
    }

    /// Appends `draft`, credits its points to every participant as one unit
    /// and publishes the outcome.
    ///
    /// Callers must hold the locks of all `participants`.
    async fn record(
        &self,
        draft: NewBunnyEvent,
        participants: &[BunnyId],
    ) -> Result<ActivityOutcome, HappinessError> {
        let RecordedActivity { event, writes } = self
            .storage
            .activities
            .record_activity(draft, participants)
            .await?;

        let now = Utc::now();
        let recorded = ChangeEvent::ActivityRecorded {
            event: event.clone(),
            timestamp: now,
        };
        let changes = writes
            .iter()
            .filter(|(_, write)| write.changed())
            .map(|(bunny_id, write)| ChangeEvent::HappinessChanged {
                bunny_id: *bunny_id,
                old_happiness: write.old,
                new_happiness: write.new,
                reason: HappinessChangeReason::Activity,
                timestamp: now,
            });
        self.event_bus
            .publish_batch(std::iter::once(recorded).chain(changes));

        let updates = writes
            .into_iter()
            .map(|(bunny_id, write)| HappinessUpdate {
                bunny_id,
                previous: write.old,
                happiness: write.new,
            })
            .collect();
        Ok(ActivityOutcome { event, updates })
    }
}
