//! Database rows and their conversion to domain types.
//!
//! This is the only place that knows how bunnies, events and the points
//! table are encoded in PostgreSQL: signed integer columns, JSONB event
//! details and `TIMESTAMPTZ` timestamps.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Bunny, BunnyEvent, BunnyId, EventDetails, EventId, EventType, Happiness, PointsConfig,
};
use crate::error::HappinessError;

/// A row from the `bunnies` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BunnyRow {
    /// Primary key.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
    /// Score, constrained to `0..=100` by a CHECK.
    pub happiness: i16,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BunnyRow> for Bunny {
    type Error = HappinessError;

    fn try_from(row: BunnyRow) -> Result<Self, Self::Error> {
        let happiness = Happiness::try_new(i64::from(row.happiness))
            .map_err(|e| HappinessError::Storage(format!("bunny {}: {e}", row.id)))?;
        Ok(Self {
            id: BunnyId::from_uuid(row.id),
            name: row.name,
            avatar_url: row.avatar_url,
            happiness,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `bunny_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Public event id.
    pub id: Uuid,
    /// Acting bunny.
    pub bunny_id: Uuid,
    /// `"eating"` or `"playing"`.
    pub event_type: String,
    /// Type-specific details as JSONB.
    pub details: serde_json::Value,
    /// Ordering timestamp.
    pub occurred_at: DateTime<Utc>,
    /// Award snapshot.
    pub points_earned: i64,
}

impl TryFrom<EventRow> for BunnyEvent {
    type Error = HappinessError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let event_id = EventId::from_uuid(row.id);
        let malformed = |reason: String| HappinessError::MalformedEvent { event_id, reason };

        let event_type = match row.event_type.as_str() {
            "eating" => EventType::Eating,
            "playing" => EventType::Playing,
            other => return Err(malformed(format!("unknown event type {other:?}"))),
        };
        let details: EventDetails = serde_json::from_value(row.details)
            .map_err(|e| malformed(format!("undecodable details: {e}")))?;
        let points_earned = u32::try_from(row.points_earned)
            .map_err(|_| malformed(format!("points_earned out of range: {}", row.points_earned)))?;

        Ok(Self {
            id: event_id,
            bunny_id: BunnyId::from_uuid(row.bunny_id),
            event_type,
            details,
            timestamp: row.occurred_at,
            points_earned,
        })
    }
}

/// The single row of the `points_config` table.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct PointsConfigRow {
    /// Lettuce weight.
    pub lettuce: i64,
    /// Carrot weight.
    pub carrot: i64,
    /// First-play weight.
    pub playing: i64,
    /// Repeat-play weight.
    pub repeat_playing: i64,
}

impl TryFrom<PointsConfigRow> for PointsConfig {
    type Error = HappinessError;

    fn try_from(row: PointsConfigRow) -> Result<Self, Self::Error> {
        let weight = |field: &str, value: i64| {
            u32::try_from(value).map_err(|_| {
                HappinessError::Storage(format!("points_config.{field} out of range: {value}"))
            })
        };
        Ok(Self {
            lettuce: weight("lettuce", row.lettuce)?,
            carrot: weight("carrot", row.carrot)?,
            playing: weight("playing", row.playing)?,
            repeat_playing: weight("repeat_playing", row.repeat_playing)?,
        })
    }
}

impl From<PointsConfig> for PointsConfigRow {
    fn from(config: PointsConfig) -> Self {
        Self {
            lettuce: i64::from(config.lettuce),
            carrot: i64::from(config.carrot),
            playing: i64::from(config.playing),
            repeat_playing: i64::from(config.repeat_playing),
        }
    }
}
