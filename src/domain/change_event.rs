//! Change notifications reflecting state mutations.
//!
//! Every state change emits a [`ChangeEvent`] through the
//! [`super::EventBus`]. Notifications are broadcast to WebSocket
//! subscribers; they are not the ledger (see [`super::BunnyEvent`]).

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BunnyEvent, BunnyId, Happiness, PointsConfig};

/// Why a bunny's happiness changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HappinessChangeReason {
    /// Incremental update from a new ledger event.
    Activity,
    /// Full replay of the bunny's history.
    Recalculation,
}

/// Notification emitted after every state mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A bunny was registered.
    BunnyAdded {
        /// New bunny.
        bunny_id: BunnyId,
        /// Its name.
        name: String,
        /// Starting happiness.
        happiness: Happiness,
        /// Registration time.
        timestamp: DateTime<Utc>,
    },

    /// A bunny's name or avatar changed.
    BunnyUpdated {
        /// Edited bunny.
        bunny_id: BunnyId,
        /// Edit time.
        timestamp: DateTime<Utc>,
    },

    /// A ledger event was appended.
    ActivityRecorded {
        /// The appended event.
        event: BunnyEvent,
        /// Append time.
        timestamp: DateTime<Utc>,
    },

    /// A bunny's happiness score changed.
    HappinessChanged {
        /// Affected bunny.
        bunny_id: BunnyId,
        /// Score before the change.
        old_happiness: Happiness,
        /// Score after the change.
        new_happiness: Happiness,
        /// What triggered the change.
        reason: HappinessChangeReason,
        /// Change time.
        timestamp: DateTime<Utc>,
    },

    /// The points table was replaced.
    PointsConfigUpdated {
        /// The new table.
        config: PointsConfig,
        /// Update time.
        timestamp: DateTime<Utc>,
    },

    /// A full recalculation pass finished.
    RecalculationCompleted {
        /// Bunnies successfully recalculated.
        recalculated: usize,
        /// Bunnies whose score changed.
        changed: usize,
        /// Bunnies that failed.
        failed: usize,
        /// Completion time.
        timestamp: DateTime<Utc>,
    },
}

impl ChangeEvent {
    /// Returns the bunny this notification is about, if any.
    ///
    /// Configuration and bulk notifications are global and return `None`.
    #[must_use]
    pub fn bunny_id(&self) -> Option<BunnyId> {
        match self {
            Self::BunnyAdded { bunny_id, .. }
            | Self::BunnyUpdated { bunny_id, .. }
            | Self::HappinessChanged { bunny_id, .. } => Some(*bunny_id),
            Self::ActivityRecorded { event, .. } => Some(event.bunny_id),
            Self::PointsConfigUpdated { .. } | Self::RecalculationCompleted { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::BunnyAdded { .. } => "bunny_added",
            Self::BunnyUpdated { .. } => "bunny_updated",
            Self::ActivityRecorded { .. } => "activity_recorded",
            Self::HappinessChanged { .. } => "happiness_changed",
            Self::PointsConfigUpdated { .. } => "points_config_updated",
            Self::RecalculationCompleted { .. } => "recalculation_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happiness_changed_serializes_with_tag() {
        let event = ChangeEvent::HappinessChanged {
            bunny_id: BunnyId::new(),
            old_happiness: Happiness::clamped(50),
            new_happiness: Happiness::clamped(52),
            reason: HappinessChangeReason::Activity,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"event_type\":\"happiness_changed\""));
        assert!(json.contains("\"new_happiness\":52"));
        assert!(json.contains("\"reason\":\"activity\""));
    }

    #[test]
    fn config_events_are_global() {
        let event = ChangeEvent::PointsConfigUpdated {
            config: PointsConfig::default(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.bunny_id(), None);
        assert_eq!(event.event_type_str(), "points_config_updated");
    }
}
