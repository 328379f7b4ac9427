//! Happiness engine: derives a score from an event history.
//!
//! The engine is pure. It never reads `points_earned` snapshots; it
//! re-prices every event under the supplied [`PointsConfig`], which is what
//! makes full recalculation after a points change possible.
//!
//! Repeat play is lifetime-scoped: the first play with a given partner earns
//! `playing`, every later play with that partner earns `repeat_playing`, no
//! matter how many other events lie in between.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{BunnyEvent, BunnyId, EventDetails, EventType, Happiness, PointsConfig};
use crate::error::HappinessError;

/// What to do with an event whose type and details disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPolicy {
    /// Count it as zero points, log a warning, keep going.
    #[default]
    Lenient,
    /// Fail the computation with [`HappinessError::MalformedEvent`].
    Strict,
}

impl FromStr for EventPolicy {
    type Err = HappinessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(HappinessError::Validation(format!(
                "unknown event policy: {other}"
            ))),
        }
    }
}

/// Result of replaying a history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replay {
    /// Unclamped sum of awards.
    pub raw_total: i64,
    /// `raw_total` clamped into `0..=100`.
    pub happiness: Happiness,
    /// Events that contributed nothing because they were malformed.
    pub malformed: usize,
}

/// Stateless happiness calculator with a fixed malformed-event policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HappinessEngine {
    policy: EventPolicy,
}

impl HappinessEngine {
    /// Creates an engine applying `policy` to malformed events.
    #[must_use]
    pub const fn new(policy: EventPolicy) -> Self {
        Self { policy }
    }

    /// Returns the configured policy.
    #[must_use]
    pub const fn policy(&self) -> EventPolicy {
        self.policy
    }

    /// Computes the happiness of `subject` from its history.
    ///
    /// Events are processed in ascending timestamp order; the sort is stable
    /// so events sharing a timestamp keep their ledger order.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::MalformedEvent`] under
    /// [`EventPolicy::Strict`] if any event is malformed.
    pub fn compute(
        &self,
        subject: BunnyId,
        events: &[BunnyEvent],
        config: &PointsConfig,
    ) -> Result<Happiness, HappinessError> {
        self.replay(subject, events, config).map(|r| r.happiness)
    }

    /// Like [`Self::compute`] but also reports the raw total.
    ///
    /// # Errors
    ///
    /// Same as [`Self::compute`].
    pub fn replay(
        &self,
        subject: BunnyId,
        events: &[BunnyEvent],
        config: &PointsConfig,
    ) -> Result<Replay, HappinessError> {
        let mut ordered: Vec<&BunnyEvent> = events.iter().collect();
        ordered.sort_by_key(|e| e.timestamp);

        let mut total: i64 = 0;
        let mut malformed = 0;
        let mut seen_partners: HashSet<BunnyId> = HashSet::new();

        for event in ordered {
            let points = match classify(subject, event) {
                Ok(Activity::Ate(food)) => config.for_food(food),
                Ok(Activity::PlayedWith(partner)) => {
                    let first_time = seen_partners.insert(partner);
                    config.for_play(!first_time)
                }
                Err(reason) => match self.policy {
                    EventPolicy::Strict => {
                        return Err(HappinessError::MalformedEvent {
                            event_id: event.id,
                            reason,
                        });
                    }
                    EventPolicy::Lenient => {
                        tracing::warn!(event_id = %event.id, %subject, %reason, "skipping malformed event");
                        malformed += 1;
                        0
                    }
                },
            };
            total = total.saturating_add(i64::from(points));
        }

        Ok(Replay {
            raw_total: total,
            happiness: Happiness::clamped(total),
            malformed,
        })
    }
}

/// Computes happiness with the lenient policy.
#[must_use]
pub fn compute_happiness(
    subject: BunnyId,
    events: &[BunnyEvent],
    config: &PointsConfig,
) -> Happiness {
    HappinessEngine::new(EventPolicy::Lenient)
        .compute(subject, events, config)
        .unwrap_or_default()
}

enum Activity {
    Ate(super::FoodType),
    PlayedWith(BunnyId),
}

fn classify(subject: BunnyId, event: &BunnyEvent) -> Result<Activity, String> {
    match (event.event_type, event.details) {
        (EventType::Eating, EventDetails::Eating(details)) => {
            if event.bunny_id == subject {
                Ok(Activity::Ate(details.food_type))
            } else {
                Err(format!("eating event belongs to bunny {}", event.bunny_id))
            }
        }
        (EventType::Playing, EventDetails::Playing(details)) => {
            if details.playmate_bunny_id == event.bunny_id {
                return Err("play event names the same bunny twice".to_string());
            }
            event
                .partner_of(subject)
                .map(Activity::PlayedWith)
                .ok_or_else(|| "play event does not involve this bunny".to_string())
        }
        (event_type, _) => Err(format!(
            "{} event carries mismatched details",
            event_type.as_str()
        )),
    }
}
