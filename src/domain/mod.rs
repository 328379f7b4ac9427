//! Domain layer: bunnies, ledger events, the points table and the engine.
//!
//! Everything in here is storage-agnostic. Timestamps are always
//! `chrono::DateTime<Utc>`; storage encodings are converted at the
//! persistence boundary.

pub mod bunny;
pub mod bunny_event;
pub mod change_event;
pub mod engine;
pub mod event_bus;
pub mod happiness;
pub mod ids;
pub mod points_config;

pub use bunny::{Bunny, BunnyProfileUpdate, NewBunny};
pub use bunny_event::{
    BunnyEvent, EatingDetails, EventDetails, EventType, FoodType, NewBunnyEvent, PlayingDetails,
};
pub use change_event::{ChangeEvent, HappinessChangeReason};
pub use engine::{EventPolicy, HappinessEngine, Replay, compute_happiness};
pub use event_bus::EventBus;
pub use happiness::{Happiness, HappinessBand};
pub use ids::{BunnyId, EventId};
pub use points_config::{PointsConfig, PointsConfigInput};
