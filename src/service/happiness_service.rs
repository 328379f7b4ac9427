//! Happiness service: the operation contract the outer layers call into.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use utoipa::ToSchema;

use super::BunnyLocks;
use crate::domain::{
    Bunny, BunnyEvent, BunnyId, BunnyProfileUpdate, ChangeEvent, EventBus, EventPolicy,
    HappinessEngine, NewBunny, PointsConfig,
};
use crate::error::HappinessError;
use crate::persistence::Storage;

/// Orchestration layer for every bunny, ledger and points operation.
///
/// Owns the [`Storage`] seams for state and the [`EventBus`] for change
/// notifications. Mutations follow the pattern: take the per-bunny lock →
/// validate → write → publish → return the new values.
///
/// The operations are split across files by concern:
/// feed/play in `activity`, replay and preview in `recalculation`,
/// points-table changes in `points`.
#[derive(Debug)]
pub struct HappinessService {
    pub(super) storage: Storage,
    pub(super) event_bus: EventBus,
    pub(super) engine: HappinessEngine,
    pub(super) default_points: PointsConfig,
    pub(super) locks: BunnyLocks,
    /// Serializes points-table updates with the recalculation they trigger.
    pub(super) config_lock: Mutex<()>,
    /// Serializes writes of the stored table. Never held while waiting on
    /// another lock.
    pub(super) config_store_lock: Mutex<()>,
    config_tx: watch::Sender<PointsConfig>,
    /// Set once the watch holds a table that came from storage.
    config_seeded: AtomicBool,
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardStats {
    /// Mean happiness, rounded to one decimal; 0 with no bunnies.
    pub average_happiness: f64,
    /// Number of registered bunnies.
    pub total_bunnies: usize,
    /// Ledger events recorded since midnight UTC.
    pub events_today: usize,
}

impl HappinessService {
    /// Creates a service with the lenient event policy and the built-in
    /// default points table.
    #[must_use]
    pub fn new(storage: Storage, event_bus: EventBus) -> Self {
        let default_points = PointsConfig::default();
        let (config_tx, _) = watch::channel(default_points);
        Self {
            storage,
            event_bus,
            engine: HappinessEngine::default(),
            default_points,
            locks: BunnyLocks::new(),
            config_lock: Mutex::new(()),
            config_store_lock: Mutex::new(()),
            config_tx,
            config_seeded: AtomicBool::new(false),
        }
    }

    /// Sets how malformed ledger events are treated during replay.
    #[must_use]
    pub fn with_event_policy(mut self, policy: EventPolicy) -> Self {
        self.engine = HappinessEngine::new(policy);
        self
    }

    /// Sets the points table used when none is stored and on reset.
    #[must_use]
    pub fn with_default_points(mut self, points: PointsConfig) -> Self {
        self.default_points = points;
        self.config_tx.send_replace(points);
        self
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the storage seams.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Returns the engine used for replays.
    #[must_use]
    pub fn engine(&self) -> &HappinessEngine {
        &self.engine
    }

    /// Returns the points table restored by a reset.
    #[must_use]
    pub fn default_points(&self) -> PointsConfig {
        self.default_points
    }

    /// Registers a bunny.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Storage`] if the registry write fails.
    pub async fn add_bunny(&self, new: NewBunny) -> Result<Bunny, HappinessError> {
        let bunny = Bunny::from_new(new, Utc::now());
        self.storage.bunnies.insert_bunny(bunny.clone()).await?;

        let _ = self.event_bus.publish(ChangeEvent::BunnyAdded {
            bunny_id: bunny.id,
            name: bunny.name.clone(),
            happiness: bunny.happiness,
            timestamp: Utc::now(),
        });

        tracing::info!(bunny_id = %bunny.id, name = %bunny.name, "bunny added");
        Ok(bunny)
    }

    /// Fetches one bunny.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::BunnyNotFound`] if it does not exist.
    pub async fn get_bunny(&self, id: BunnyId) -> Result<Bunny, HappinessError> {
        self.storage
            .bunnies
            .get_bunny(id)
            .await?
            .ok_or(HappinessError::BunnyNotFound(id))
    }

    /// Lists every bunny, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Storage`] on backend failure.
    pub async fn list_bunnies(&self) -> Result<Vec<Bunny>, HappinessError> {
        self.storage.bunnies.list_bunnies().await
    }

    /// Edits a bunny's name or avatar.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::BunnyNotFound`] if it does not exist.
    pub async fn update_bunny(
        &self,
        id: BunnyId,
        update: &BunnyProfileUpdate,
    ) -> Result<Bunny, HappinessError> {
        let bunny = self.storage.bunnies.update_profile(id, update).await?;
        let _ = self.event_bus.publish(ChangeEvent::BunnyUpdated {
            bunny_id: id,
            timestamp: Utc::now(),
        });
        Ok(bunny)
    }

    /// Ledger events the bunny took part in, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::BunnyNotFound`] if it does not exist.
    pub async fn bunny_events(&self, id: BunnyId) -> Result<Vec<BunnyEvent>, HappinessError> {
        self.get_bunny(id).await?;
        self.storage.events.list_events_for_bunny(id).await
    }

    /// Computes the dashboard headline numbers.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Storage`] on backend failure.
    pub async fn stats(&self) -> Result<DashboardStats, HappinessError> {
        let (bunnies, events) = tokio::try_join!(
            self.storage.bunnies.list_bunnies(),
            self.storage.events.list_events(),
        )?;

        let average_happiness = if bunnies.is_empty() {
            0.0
        } else {
            let total: u64 = bunnies.iter().map(|b| u64::from(b.happiness.get())).sum();
            #[allow(clippy::cast_precision_loss)]
            let mean = total as f64 / bunnies.len() as f64;
            (mean * 10.0).round() / 10.0
        };

        let today = Utc::now().date_naive();
        let events_today = events
            .iter()
            .filter(|e| e.timestamp.date_naive() == today)
            .count();

        Ok(DashboardStats {
            average_happiness,
            total_bunnies: bunnies.len(),
            events_today,
        })
    }

    /// Returns the stored points table, writing the default on first use.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Storage`] on backend failure.
    pub async fn current_config(&self) -> Result<PointsConfig, HappinessError> {
        if let Some(config) = self.storage.config.load_config().await? {
            self.seed_config_watch(config);
            return Ok(config);
        }

        let _store_guard = self.config_store_lock.lock().await;
        if let Some(config) = self.storage.config.load_config().await? {
            self.seed_config_watch(config);
            return Ok(config);
        }
        self.storage.config.save_config(self.default_points).await?;
        self.publish_config(self.default_points);
        tracing::info!(config = ?self.default_points, "initialized default points table");
        Ok(self.default_points)
    }

    /// Subscribes to points-table changes.
    ///
    /// The receiver starts at the last table this service stored or loaded
    /// and is updated before the recalculation that follows an update.
    #[must_use]
    pub fn subscribe_config(&self) -> watch::Receiver<PointsConfig> {
        self.config_tx.subscribe()
    }

    /// Stores `config` as the new table and publishes it to watchers.
    pub(super) async fn store_config(&self, config: PointsConfig) -> Result<(), HappinessError> {
        let _store_guard = self.config_store_lock.lock().await;
        self.storage.config.save_config(config).await?;
        self.publish_config(config);
        Ok(())
    }

    fn publish_config(&self, config: PointsConfig) {
        self.config_tx.send_modify(|current| {
            *current = config;
            self.config_seeded.store(true, Ordering::Release);
        });
    }

    /// Moves the watch to a table read from storage, unless one was already
    /// published. A later publish always wins over an earlier read.
    fn seed_config_watch(&self, loaded: PointsConfig) {
        self.config_tx.send_if_modified(|current| {
            if self.config_seeded.swap(true, Ordering::AcqRel) || *current == loaded {
                return false;
            }
            *current = loaded;
            true
        });
    }

    /// Reads the points table without initializing it.
    pub(super) async fn peek_config(&self) -> Result<PointsConfig, HappinessError> {
        Ok(self
            .storage
            .config
            .load_config()
            .await?
            .unwrap_or(self.default_points))
    }
}
