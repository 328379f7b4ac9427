//! Points-table updates and their propagation.

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::{HappinessService, RecalculationReport};
use crate::domain::{ChangeEvent, PointsConfig, PointsConfigInput};
use crate::error::HappinessError;

/// Result of replacing the points table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConfigUpdate {
    /// The table now stored.
    pub config: PointsConfig,
    /// The recalculation pass the update triggered.
    pub recalculation: RecalculationReport,
}

impl HappinessService {
    /// Validates and stores a new points table, then recalculates every
    /// bunny under it before returning.
    ///
    /// Subscribers see `points_config_updated` before
    /// `recalculation_completed`.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Validation`] if any weight is negative,
    /// fractional or too large; nothing is stored in that case. Returns
    /// [`HappinessError::Storage`] if the table cannot be saved.
    pub async fn update_config(
        &self,
        input: PointsConfigInput,
    ) -> Result<ConfigUpdate, HappinessError> {
        let config = PointsConfig::try_from(input)?;
        self.apply_config(config).await
    }

    /// Restores the default points table through the same path as
    /// [`Self::update_config`].
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Storage`] if the table cannot be saved.
    pub async fn reset_config(&self) -> Result<ConfigUpdate, HappinessError> {
        tracing::info!("resetting points table to defaults");
        self.apply_config(self.default_points).await
    }

    async fn apply_config(&self, config: PointsConfig) -> Result<ConfigUpdate, HappinessError> {
        let _config_guard = self.config_lock.lock().await;

        self.store_config(config).await?;
        let _ = self.event_bus.publish(ChangeEvent::PointsConfigUpdated {
            config,
            timestamp: Utc::now(),
        });
        tracing::info!(
            lettuce = config.lettuce,
            carrot = config.carrot,
            playing = config.playing,
            repeat_playing = config.repeat_playing,
            "points table updated"
        );

        let recalculation = self.recalculate_all_with(&config).await?;
        Ok(ConfigUpdate {
            config,
            recalculation,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use futures_util::future::join_all;
    use tokio_test::{assert_err, assert_ok};

    use super::super::test_support::{add_bunny, make_service};
    use super::*;
    use crate::domain::FoodType;

    fn input(lettuce: f64, carrot: f64, playing: f64, repeat_playing: f64) -> PointsConfigInput {
        PointsConfigInput {
            lettuce,
            carrot,
            playing,
            repeat_playing,
        }
    }

    #[tokio::test]
    async fn update_stores_and_recalculates() {
        let service = make_service();
        let bunny = add_bunny(&service, "Clover", 0).await;
        assert_ok!(service.feed(bunny.id, FoodType::Carrot).await);

        let update = assert_ok!(service.update_config(input(1.0, 10.0, 2.0, 4.0)).await);
        assert_eq!(update.config.carrot, 10);
        assert_eq!(update.recalculation.recalculated, 1);
        assert_eq!(update.recalculation.changed, 1);

        let stored = assert_ok!(service.get_bunny(bunny.id).await);
        assert_eq!(stored.happiness.get(), 10);
        assert_eq!(assert_ok!(service.current_config().await), update.config);
    }

    #[tokio::test]
    async fn invalid_input_changes_nothing() {
        let service = make_service();
        let before = assert_ok!(service.current_config().await);

        for bad in [
            input(-1.0, 3.0, 2.0, 4.0),
            input(1.5, 3.0, 2.0, 4.0),
            input(1.0, f64::NAN, 2.0, 4.0),
        ] {
            let err = assert_err!(service.update_config(bad).await);
            assert!(matches!(err, HappinessError::Validation(_)));
        }
        assert_eq!(assert_ok!(service.current_config().await), before);
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let service = make_service();
        assert_ok!(service.update_config(input(9.0, 9.0, 9.0, 9.0)).await);

        let update = assert_ok!(service.reset_config().await);
        assert_eq!(update.config, PointsConfig::default());
    }

    #[tokio::test]
    async fn watchers_and_subscribers_see_update_before_completion() {
        let service = make_service();
        let mut watcher = service.subscribe_config();
        let mut rx = service.event_bus().subscribe();

        let update = assert_ok!(service.update_config(input(2.0, 3.0, 2.0, 4.0)).await);

        assert!(assert_ok!(watcher.has_changed()));
        assert_eq!(*watcher.borrow_and_update(), update.config);

        let Ok(first) = rx.recv().await else {
            panic!("expected config event");
        };
        assert_eq!(first.event_type_str(), "points_config_updated");
        let Ok(second) = rx.recv().await else {
            panic!("expected completion event");
        };
        assert_eq!(second.event_type_str(), "recalculation_completed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn feeds_racing_an_update_settle_on_the_new_table() {
        let service = Arc::new(make_service());
        let bunny = add_bunny(&service, "Clover", 0).await;
        assert_ok!(service.current_config().await);

        let feeds = (0..10).map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.feed(bunny.id, FoodType::Lettuce).await })
        });
        let feeds = tokio::spawn(join_all(feeds));
        assert_ok!(service.update_config(input(5.0, 3.0, 2.0, 4.0)).await);
        for joined in assert_ok!(feeds.await) {
            assert!(matches!(joined, Ok(Ok(_))));
        }

        // Every feed either ran under the new table or was replayed by the
        // update, so the stored score matches a fresh replay.
        let stored = assert_ok!(service.get_bunny(bunny.id).await);
        assert_eq!(stored.happiness.get(), 50);
        let replay = assert_ok!(service.recalculate_one(bunny.id).await);
        assert!(!replay.changed());
    }
}
