//! Ledger events: what a bunny did and what it earned for it.
//!
//! An event is immutable once appended. `points_earned` is a snapshot of
//! the award under the points table in force when the event was recorded,
//! so historical events stay auditable after the table changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{BunnyId, EventId};

/// Kind of activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The bunny ate something.
    Eating,
    /// The bunny played with another bunny.
    Playing,
}

impl EventType {
    /// Storage discriminator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eating => "eating",
            Self::Playing => "playing",
        }
    }
}

/// Food a bunny can be fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FoodType {
    /// Worth the `lettuce` weight.
    Lettuce,
    /// Worth the `carrot` weight.
    Carrot,
}

/// Details of an eating event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EatingDetails {
    /// What was eaten.
    pub food_type: FoodType,
}

/// Details of a playing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayingDetails {
    /// The other participant.
    pub playmate_bunny_id: BunnyId,
    /// Whether the pair had played together before this event.
    pub is_repeat_play: bool,
}

/// Type-specific payload of an event.
///
/// Stored separately from [`EventType`], so a record read back from storage
/// can disagree with its own type; the engine treats that as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum EventDetails {
    /// Payload of an eating event.
    Eating(EatingDetails),
    /// Payload of a playing event.
    Playing(PlayingDetails),
}

/// An event as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BunnyEvent {
    /// Ledger-assigned identifier.
    pub id: EventId,
    /// The bunny that performed the activity.
    pub bunny_id: BunnyId,
    /// Activity kind.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Activity payload.
    pub details: EventDetails,
    /// When the event was recorded; the ordering key.
    pub timestamp: DateTime<Utc>,
    /// Points awarded when the event was recorded.
    pub points_earned: u32,
}

impl BunnyEvent {
    /// Returns the other participant when this is a well-formed play event
    /// involving `subject`.
    #[must_use]
    pub fn partner_of(&self, subject: BunnyId) -> Option<BunnyId> {
        let EventDetails::Playing(play) = self.details else {
            return None;
        };
        if self.bunny_id == subject {
            Some(play.playmate_bunny_id)
        } else if play.playmate_bunny_id == subject {
            Some(self.bunny_id)
        } else {
            None
        }
    }

    /// Returns `true` if `bunny` is the actor or the playmate.
    #[must_use]
    pub fn involves(&self, bunny: BunnyId) -> bool {
        self.bunny_id == bunny
            || matches!(self.details, EventDetails::Playing(p) if p.playmate_bunny_id == bunny)
    }

    /// Returns `true` if this is a play event between `a` and `b`, in
    /// either direction.
    #[must_use]
    pub fn is_play_between(&self, a: BunnyId, b: BunnyId) -> bool {
        self.event_type == EventType::Playing && self.partner_of(a) == Some(b)
    }
}

/// An event about to be appended; the ledger assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBunnyEvent {
    /// Acting bunny.
    pub bunny_id: BunnyId,
    /// Activity kind.
    pub event_type: EventType,
    /// Activity payload.
    pub details: EventDetails,
    /// Recording time.
    pub timestamp: DateTime<Utc>,
    /// Award snapshot.
    pub points_earned: u32,
}

impl NewBunnyEvent {
    /// An eating event.
    #[must_use]
    pub fn eating(bunny_id: BunnyId, food_type: FoodType, points_earned: u32) -> Self {
        Self {
            bunny_id,
            event_type: EventType::Eating,
            details: EventDetails::Eating(EatingDetails { food_type }),
            timestamp: Utc::now(),
            points_earned,
        }
    }

    /// A playing event initiated by `bunny_id`.
    #[must_use]
    pub fn playing(
        bunny_id: BunnyId,
        playmate_bunny_id: BunnyId,
        is_repeat_play: bool,
        points_earned: u32,
    ) -> Self {
        Self {
            bunny_id,
            event_type: EventType::Playing,
            details: EventDetails::Playing(PlayingDetails {
                playmate_bunny_id,
                is_repeat_play,
            }),
            timestamp: Utc::now(),
            points_earned,
        }
    }

    /// Stamps the ledger id onto the event.
    #[must_use]
    pub fn into_event(self, id: EventId) -> BunnyEvent {
        BunnyEvent {
            id,
            bunny_id: self.bunny_id,
            event_type: self.event_type,
            details: self.details,
            timestamp: self.timestamp,
            points_earned: self.points_earned,
        }
    }
}
