//! Persistence layer: the storage seams the service depends on.
//!
//! The service never talks to a database directly. It holds a [`Storage`]
//! bundle of trait objects: the bunny registry, the event ledger, the
//! points-table record and the activity writer. Two backends implement the
//! first three: [`memory::MemoryStore`] and [`postgres::PostgresStore`].
//! Activities go through a database transaction on PostgreSQL and through
//! [`compensating::CompensatingActivityStore`] everywhere else.

pub mod compensating;
pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    Bunny, BunnyEvent, BunnyId, BunnyProfileUpdate, EventId, Happiness, NewBunnyEvent,
    PointsConfig,
};
use crate::error::HappinessError;

pub use compensating::CompensatingActivityStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Old and new value of a single happiness write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HappinessWrite {
    /// Score before the write.
    pub old: Happiness,
    /// Score after the write.
    pub new: Happiness,
}

impl HappinessWrite {
    /// Delta actually applied after clamping.
    #[must_use]
    pub fn applied_delta(&self) -> i64 {
        self.new.delta_from(self.old)
    }

    /// Returns `true` if the write changed the score.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}

/// Bunny registry.
#[async_trait]
pub trait BunnyStore: fmt::Debug + Send + Sync + 'static {
    /// Stores a new bunny.
    async fn insert_bunny(&self, bunny: Bunny) -> Result<(), HappinessError>;

    /// Fetches a bunny, `None` when it does not exist.
    async fn get_bunny(&self, id: BunnyId) -> Result<Option<Bunny>, HappinessError>;

    /// Lists every bunny, oldest first.
    async fn list_bunnies(&self) -> Result<Vec<Bunny>, HappinessError>;

    /// Applies a metadata edit and returns the updated bunny.
    async fn update_profile(
        &self,
        id: BunnyId,
        update: &BunnyProfileUpdate,
    ) -> Result<Bunny, HappinessError>;

    /// Overwrites the happiness score.
    async fn set_happiness(
        &self,
        id: BunnyId,
        value: Happiness,
    ) -> Result<HappinessWrite, HappinessError>;

    /// Atomically adds `delta` to the score, clamping into `0..=100`.
    ///
    /// This is the read-modify-write primitive that keeps concurrent
    /// updates on the same bunny from losing each other.
    async fn adjust_happiness(
        &self,
        id: BunnyId,
        delta: i64,
    ) -> Result<HappinessWrite, HappinessError>;
}

/// Append-only event ledger.
#[async_trait]
pub trait EventStore: fmt::Debug + Send + Sync + 'static {
    /// Appends an event and returns it with its assigned id.
    async fn append_event(&self, event: NewBunnyEvent) -> Result<BunnyEvent, HappinessError>;

    /// Removes an event. Only used to compensate a half-applied activity.
    async fn remove_event(&self, id: EventId) -> Result<(), HappinessError>;

    /// Events the bunny took part in (as actor or playmate), ascending by
    /// timestamp with ties in append order.
    async fn list_events_for_bunny(&self, id: BunnyId)
    -> Result<Vec<BunnyEvent>, HappinessError>;

    /// Every event, ascending by timestamp with ties in append order.
    async fn list_events(&self) -> Result<Vec<BunnyEvent>, HappinessError>;

    /// Returns `true` if `a` and `b` have any play event together, in
    /// either direction.
    async fn has_played_together(&self, a: BunnyId, b: BunnyId) -> Result<bool, HappinessError>;
}

/// The single points-table record.
#[async_trait]
pub trait ConfigStore: fmt::Debug + Send + Sync + 'static {
    /// Loads the record, `None` if it was never written.
    async fn load_config(&self) -> Result<Option<PointsConfig>, HappinessError>;

    /// Replaces the record.
    async fn save_config(&self, config: PointsConfig) -> Result<(), HappinessError>;
}

/// A ledger event together with the participant writes it caused.
#[derive(Debug, Clone)]
pub struct RecordedActivity {
    /// The persisted event.
    pub event: BunnyEvent,
    /// One write per participant, in the order they were passed.
    pub writes: Vec<(BunnyId, HappinessWrite)>,
}

/// All-or-nothing writer for feed and play.
#[async_trait]
pub trait ActivityStore: fmt::Debug + Send + Sync + 'static {
    /// Appends `event` and adds its points to every participant.
    ///
    /// Either the event and every write are stored, or none of them is.
    async fn record_activity(
        &self,
        event: NewBunnyEvent,
        participants: &[BunnyId],
    ) -> Result<RecordedActivity, HappinessError>;
}

/// The storage seams the service works against.
#[derive(Debug, Clone)]
pub struct Storage {
    /// Bunny registry.
    pub bunnies: Arc<dyn BunnyStore>,
    /// Event ledger.
    pub events: Arc<dyn EventStore>,
    /// Points-table record.
    pub config: Arc<dyn ConfigStore>,
    /// Activity writer.
    pub activities: Arc<dyn ActivityStore>,
}

impl Storage {
    /// Uses one backend for every seam, recording activities with
    /// compensation.
    #[must_use]
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: BunnyStore + EventStore + ConfigStore,
    {
        let bunnies = Arc::clone(&backend) as Arc<dyn BunnyStore>;
        let events = Arc::clone(&backend) as Arc<dyn EventStore>;
        Self::assemble(bunnies, events, backend as Arc<dyn ConfigStore>)
    }

    /// Uses one backend for every seam, including its own transactional
    /// activity writer.
    #[must_use]
    pub fn from_transactional_backend<B>(backend: Arc<B>) -> Self
    where
        B: BunnyStore + EventStore + ConfigStore + ActivityStore,
    {
        Self {
            bunnies: Arc::clone(&backend) as Arc<dyn BunnyStore>,
            events: Arc::clone(&backend) as Arc<dyn EventStore>,
            config: Arc::clone(&backend) as Arc<dyn ConfigStore>,
            activities: backend as Arc<dyn ActivityStore>,
        }
    }

    /// Combines separate seams; activities are recorded with compensation
    /// over `bunnies` and `events`.
    #[must_use]
    pub fn assemble(
        bunnies: Arc<dyn BunnyStore>,
        events: Arc<dyn EventStore>,
        config: Arc<dyn ConfigStore>,
    ) -> Self {
        let activities: Arc<dyn ActivityStore> = Arc::new(CompensatingActivityStore::new(
            Arc::clone(&bunnies),
            Arc::clone(&events),
        ));
        Self {
            bunnies,
            events,
            config,
            activities,
        }
    }

    /// Fresh in-memory storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }
}
