//! Recalculation orchestrator and impact preview.
//!
//! Recalculation replays a bunny's full history under one points table and
//! persists the result. It is idempotent, so a bulk pass never needs to
//! freeze writers: a feed racing with the pass is either replayed or applied
//! on top of the replayed value.

use std::collections::HashMap;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use utoipa::ToSchema;

use super::HappinessService;
use crate::domain::{
    BunnyEvent, BunnyId, ChangeEvent, EventDetails, Happiness, HappinessChangeReason,
    PointsConfig,
};
use crate::error::HappinessError;

/// Bunnies replayed concurrently during a bulk pass.
const RECALCULATION_CONCURRENCY: usize = 8;

/// Change below this is treated as no change in previews.
const IMPACT_EPSILON: f64 = 0.01;

/// Outcome of replaying one bunny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct BunnyRecalculation {
    /// Replayed bunny.
    pub bunny_id: BunnyId,
    /// Stored score before the replay.
    pub previous: Happiness,
    /// Replayed score, now stored.
    pub happiness: Happiness,
}

impl BunnyRecalculation {
    /// Returns `true` if the replay changed the stored score.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.previous != self.happiness
    }
}

/// A bunny a bulk pass could not recalculate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RecalculationFailure {
    /// Failed bunny.
    pub bunny_id: BunnyId,
    /// Numeric error code.
    pub code: u32,
    /// Error message.
    pub message: String,
}

/// Summary of a bulk recalculation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RecalculationReport {
    /// Bunnies recalculated successfully.
    pub recalculated: usize,
    /// Of those, how many changed score.
    pub changed: usize,
    /// Bunnies that failed; the pass continues past them.
    pub failures: Vec<RecalculationFailure>,
    /// Per-bunny results, in registry order.
    pub results: Vec<BunnyRecalculation>,
}

/// Projected effect of a candidate points table on one bunny.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct BunnyImpact {
    /// Affected bunny.
    pub bunny_id: BunnyId,
    /// Score under the current table.
    pub current: Happiness,
    /// Score under the candidate table.
    pub projected: Happiness,
    /// `projected - current`.
    pub change: f64,
}

/// Dry-run result of a candidate points table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ImpactReport {
    /// Bunnies whose score would change.
    pub affected_bunnies: Vec<BunnyId>,
    /// Per-bunny projection for each affected bunny.
    pub previews: Vec<BunnyImpact>,
    /// Mean change over affected bunnies; 0 when none.
    pub average_happiness_change: f64,
    /// Ledger events replayed to build the preview.
    pub events_considered: usize,
    /// Ledger events involving at least one affected bunny.
    pub affected_events: usize,
}

impl HappinessService {
    /// Replays one bunny's history under the current points table.
    ///
    /// Waits for a points-table update in progress, so the stored score is
    /// never computed under a table that has already been replaced.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::BunnyNotFound`] if the bunny does not
    /// exist, [`HappinessError::MalformedEvent`] under the strict policy, or
    /// [`HappinessError::Storage`] on backend failure.
    pub async fn recalculate_one(
        &self,
        bunny_id: BunnyId,
    ) -> Result<BunnyRecalculation, HappinessError> {
        let _config_guard = self.config_lock.lock().await;
        let config = self.current_config().await?;
        self.recalculate_bunny(bunny_id, &config).await
    }

    /// Replays every bunny under the current points table.
    ///
    /// Per-bunny failures are collected in the report and never abort the
    /// pass.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Storage`] only if the config or the bunny
    /// list cannot be read.
    pub async fn recalculate_all(&self) -> Result<RecalculationReport, HappinessError> {
        let _config_guard = self.config_lock.lock().await;
        let config = self.current_config().await?;
        self.recalculate_all_with(&config).await
    }

    /// Bulk pass under an already-read points table.
    ///
    /// Callers must hold `config_lock`.
    pub(super) async fn recalculate_all_with(
        &self,
        config: &PointsConfig,
    ) -> Result<RecalculationReport, HappinessError> {
        let bunnies = self.storage.bunnies.list_bunnies().await?;
        tracing::info!(bunnies = bunnies.len(), ?config, "recalculation started");

        let mut outcomes: Vec<(BunnyId, Result<BunnyRecalculation, HappinessError>)> =
            Vec::with_capacity(bunnies.len());
        for batch in bunnies.chunks(RECALCULATION_CONCURRENCY) {
            let results = join_all(
                batch
                    .iter()
                    .map(|bunny| self.recalculate_bunny(bunny.id, config)),
            )
            .await;
            outcomes.extend(batch.iter().map(|b| b.id).zip(results));
        }

        let mut report = RecalculationReport::default();
        for (bunny_id, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    report.recalculated += 1;
                    if result.changed() {
                        report.changed += 1;
                    }
                    report.results.push(result);
                }
                Err(err) => {
                    tracing::warn!(%bunny_id, error = %err, "bunny recalculation failed");
                    report.failures.push(RecalculationFailure {
                        bunny_id,
                        code: err.error_code(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let _ = self.event_bus.publish(ChangeEvent::RecalculationCompleted {
            recalculated: report.recalculated,
            changed: report.changed,
            failed: report.failures.len(),
            timestamp: Utc::now(),
        });
        tracing::info!(
            recalculated = report.recalculated,
            changed = report.changed,
            failed = report.failures.len(),
            "recalculation completed"
        );
        Ok(report)
    }

    /// Projects the effect of `candidate` without writing anything.
    ///
    /// Both the current and the candidate score are replayed from history,
    /// so the preview is independent of incremental drift.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::MalformedEvent`] under the strict policy,
    /// or [`HappinessError::Storage`] on backend failure.
    pub async fn preview_impact(
        &self,
        candidate: &PointsConfig,
    ) -> Result<ImpactReport, HappinessError> {
        let (current, bunnies, events) = tokio::try_join!(
            self.peek_config(),
            self.storage.bunnies.list_bunnies(),
            self.storage.events.list_events(),
        )?;

        let histories = histories_by_participant(&events);
        let mut report = ImpactReport {
            events_considered: events.len(),
            ..ImpactReport::default()
        };

        for bunny in &bunnies {
            let history = histories.get(&bunny.id).map_or(&[][..], Vec::as_slice);
            let now = self.engine.compute(bunny.id, history, &current)?;
            let projected = self.engine.compute(bunny.id, history, candidate)?;
            #[allow(clippy::cast_precision_loss)]
            let change = projected.delta_from(now) as f64;
            if change.abs() > IMPACT_EPSILON {
                report.affected_bunnies.push(bunny.id);
                report.previews.push(BunnyImpact {
                    bunny_id: bunny.id,
                    current: now,
                    projected,
                    change,
                });
            }
        }

        if !report.previews.is_empty() {
            let total: f64 = report.previews.iter().map(|p| p.change).sum();
            #[allow(clippy::cast_precision_loss)]
            let count = report.previews.len() as f64;
            report.average_happiness_change = total / count;
        }
        report.affected_events = events
            .iter()
            .filter(|e| report.affected_bunnies.iter().any(|id| e.involves(*id)))
            .count();

        tracing::debug!(
            affected = report.affected_bunnies.len(),
            events = report.events_considered,
            "impact preview computed"
        );
        Ok(report)
    }

    /// Locks one bunny, replays it under `config` and stores the result if
    /// it differs.
    async fn recalculate_bunny(
        &self,
        bunny_id: BunnyId,
        config: &PointsConfig,
    ) -> Result<BunnyRecalculation, HappinessError> {
        let _guard = self.locks.acquire(&[bunny_id]).await;
        let bunny = self.get_bunny(bunny_id).await?;
        let history = self.storage.events.list_events_for_bunny(bunny_id).await?;
        let happiness = self.engine.compute(bunny_id, &history, config)?;

        if happiness != bunny.happiness {
            let write = self
                .storage
                .bunnies
                .set_happiness(bunny_id, happiness)
                .await?;
            let _ = self.event_bus.publish(ChangeEvent::HappinessChanged {
                bunny_id,
                old_happiness: write.old,
                new_happiness: write.new,
                reason: HappinessChangeReason::Recalculation,
                timestamp: Utc::now(),
            });
            tracing::debug!(%bunny_id, old = %write.old, new = %write.new, "happiness recalculated");
        }

        Ok(BunnyRecalculation {
            bunny_id,
            previous: bunny.happiness,
            happiness,
        })
    }
}

/// Groups the ledger by participant: every event is listed under its actor
/// and, for plays, under the playmate too.
fn histories_by_participant(events: &[BunnyEvent]) -> HashMap<BunnyId, Vec<BunnyEvent>> {
    let mut histories: HashMap<BunnyId, Vec<BunnyEvent>> = HashMap::new();
    for event in events {
        histories
            .entry(event.bunny_id)
            .or_default()
            .push(event.clone());
        if let EventDetails::Playing(play) = event.details {
            if play.playmate_bunny_id != event.bunny_id {
                histories
                    .entry(play.playmate_bunny_id)
                    .or_default()
                    .push(event.clone());
            }
        }
    }
    histories
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::super::test_support::{
        add_bunny, flaky_service, make_service, slow_config_service,
    };
    use super::*;
    use crate::domain::{FoodType, PointsConfigInput};

    #[tokio::test]
    async fn recalculate_one_replays_full_history() {
        let service = make_service();
        let a = add_bunny(&service, "Clover", 0).await;
        let b = add_bunny(&service, "Thumper", 0).await;
        for step in [
            service.feed(a.id, FoodType::Lettuce).await,
            service.play(a.id, b.id).await,
            service.play(a.id, b.id).await,
            service.feed(a.id, FoodType::Carrot).await,
        ] {
            assert!(step.is_ok());
        }
        // Drift the stored value away from the ledger.
        let _ = service
            .storage()
            .bunnies
            .set_happiness(a.id, Happiness::clamped(77))
            .await;

        let Ok(result) = service.recalculate_one(a.id).await else {
            panic!("recalculation failed");
        };
        assert_eq!(result.previous.get(), 77);
        assert_eq!(result.happiness.get(), 10);
        assert!(matches!(service.get_bunny(a.id).await, Ok(s) if s.happiness.get() == 10));
    }

    #[tokio::test]
    async fn playmate_recalculation_matches_incremental_value() {
        let service = make_service();
        let a = add_bunny(&service, "Clover", 0).await;
        let b = add_bunny(&service, "Thumper", 0).await;
        let _ = service.play(a.id, b.id).await;
        let _ = service.play(b.id, a.id).await;

        let Ok(result) = service.recalculate_one(b.id).await else {
            panic!("recalculation failed");
        };
        assert_eq!(result.previous, result.happiness);
        assert_eq!(result.happiness.get(), 6);
    }

    #[tokio::test]
    async fn recalculate_missing_bunny_is_not_found() {
        let service = make_service();
        let result = service.recalculate_one(BunnyId::new()).await;
        assert!(matches!(result, Err(HappinessError::BunnyNotFound(_))));
    }

    #[tokio::test]
    async fn recalculate_all_is_idempotent() {
        let service = make_service();
        let a = add_bunny(&service, "Clover", 0).await;
        let _ = service.feed(a.id, FoodType::Carrot).await;
        let _b = add_bunny(&service, "Thumper", 30).await;

        let Ok(first) = service.recalculate_all().await else {
            panic!("first pass failed");
        };
        assert_eq!(first.recalculated, 2);
        // Thumper has no history and drops to 0.
        assert_eq!(first.changed, 1);

        let Ok(second) = service.recalculate_all().await else {
            panic!("second pass failed");
        };
        assert_eq!(second.recalculated, 2);
        assert_eq!(second.changed, 0);
    }

    #[tokio::test]
    async fn one_failing_history_does_not_abort_the_pass() {
        let (service, events) = flaky_service();
        let a = add_bunny(&service, "Clover", 0).await;
        let b = add_bunny(&service, "Thumper", 0).await;
        let c = add_bunny(&service, "Hazel", 0).await;
        events.fail_history_for(b.id).await;

        let Ok(report) = service.recalculate_all().await else {
            panic!("pass failed");
        };
        assert_eq!(report.recalculated, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures.iter().all(|f| f.bunny_id == b.id));
        let ids: Vec<BunnyId> = report.results.iter().map(|r| r.bunny_id).collect();
        assert!(ids.contains(&a.id) && ids.contains(&c.id));
    }

    #[tokio::test]
    async fn recalculation_publishes_completion() {
        let service = make_service();
        let _ = add_bunny(&service, "Clover", 0).await;
        let mut rx = service.event_bus().subscribe();

        let _ = service.recalculate_all().await;

        let Ok(event) = rx.recv().await else {
            panic!("expected completion event");
        };
        assert!(matches!(
            event,
            ChangeEvent::RecalculationCompleted { recalculated: 1, failed: 0, .. }
        ));
    }

    #[tokio::test]
    async fn preview_is_empty_for_current_config() {
        let service = make_service();
        let a = add_bunny(&service, "Clover", 0).await;
        let _ = service.feed(a.id, FoodType::Lettuce).await;

        let Ok(current) = service.current_config().await else {
            panic!("config read failed");
        };
        let Ok(report) = service.preview_impact(&current).await else {
            panic!("preview failed");
        };
        assert!(report.affected_bunnies.is_empty());
        assert_eq!(report.average_happiness_change, 0.0);
        assert_eq!(report.events_considered, 1);
        assert_eq!(report.affected_events, 0);
    }

    #[tokio::test]
    async fn preview_projects_without_writing() {
        let service = make_service();
        let a = add_bunny(&service, "Clover", 0).await;
        let b = add_bunny(&service, "Thumper", 0).await;
        let idle = add_bunny(&service, "Hazel", 0).await;
        let _ = service.feed(a.id, FoodType::Carrot).await;
        let _ = service.play(a.id, b.id).await;

        let candidate = PointsConfig {
            lettuce: 1,
            carrot: 10,
            playing: 2,
            repeat_playing: 4,
        };
        let Ok(first) = service.preview_impact(&candidate).await else {
            panic!("preview failed");
        };
        let Ok(second) = service.preview_impact(&candidate).await else {
            panic!("preview failed");
        };
        assert_eq!(first, second);

        assert_eq!(first.affected_bunnies, vec![a.id]);
        assert!(!first.affected_bunnies.contains(&idle.id));
        let Some(preview) = first.previews.first() else {
            panic!("expected a preview");
        };
        assert_eq!((preview.current.get(), preview.projected.get()), (5, 12));
        assert!((first.average_happiness_change - 7.0).abs() < f64::EPSILON);
        assert_eq!(first.events_considered, 2);
        assert_eq!(first.affected_events, 2);

        assert!(matches!(service.get_bunny(a.id).await, Ok(s) if s.happiness.get() == 5));
        assert!(matches!(service.current_config().await, Ok(c) if c == PointsConfig::default()));
    }

    #[tokio::test]
    async fn single_replay_overlapping_an_update_keeps_the_new_table() {
        let service = Arc::new(slow_config_service(Duration::from_millis(80)));
        let bunny = add_bunny(&service, "Clover", 0).await;
        let Ok(_) = service.feed(bunny.id, FoodType::Carrot).await else {
            panic!("feed failed");
        };

        let replay = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.recalculate_one(bunny.id).await }
        });
        // Let the replay read the old table before the update starts.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let update = service
            .update_config(PointsConfigInput {
                lettuce: 1.0,
                carrot: 10.0,
                playing: 2.0,
                repeat_playing: 4.0,
            })
            .await;
        assert!(update.is_ok());
        assert!(matches!(replay.await, Ok(Ok(_))));

        let Ok(stored) = service.get_bunny(bunny.id).await else {
            panic!("bunny vanished");
        };
        assert_eq!(stored.happiness.get(), 10);
    }
}
