//! Points table: how much happiness each activity awards.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::FoodType;
use crate::error::HappinessError;

/// The four activity weights. One record governs the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct PointsConfig {
    /// Award for eating lettuce.
    pub lettuce: u32,
    /// Award for eating a carrot.
    pub carrot: u32,
    /// Award for a first play between two bunnies.
    pub playing: u32,
    /// Award for any later play between the same two bunnies.
    pub repeat_playing: u32,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            lettuce: 1,
            carrot: 3,
            playing: 2,
            repeat_playing: 4,
        }
    }
}

impl PointsConfig {
    /// Award for eating `food`.
    #[must_use]
    pub const fn for_food(&self, food: FoodType) -> u32 {
        match food {
            FoodType::Lettuce => self.lettuce,
            FoodType::Carrot => self.carrot,
        }
    }

    /// Award for a play event.
    #[must_use]
    pub const fn for_play(&self, is_repeat_play: bool) -> u32 {
        if is_repeat_play {
            self.repeat_playing
        } else {
            self.playing
        }
    }
}

/// Unvalidated points table as submitted by a client.
///
/// Fields are plain JSON numbers so that negative and fractional values
/// reach validation instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PointsConfigInput {
    /// Proposed lettuce weight.
    pub lettuce: f64,
    /// Proposed carrot weight.
    pub carrot: f64,
    /// Proposed first-play weight.
    pub playing: f64,
    /// Proposed repeat-play weight.
    pub repeat_playing: f64,
}

impl From<PointsConfig> for PointsConfigInput {
    fn from(config: PointsConfig) -> Self {
        Self {
            lettuce: f64::from(config.lettuce),
            carrot: f64::from(config.carrot),
            playing: f64::from(config.playing),
            repeat_playing: f64::from(config.repeat_playing),
        }
    }
}

impl TryFrom<PointsConfigInput> for PointsConfig {
    type Error = HappinessError;

    /// Strict validation: every weight must be a finite, whole, non-negative
    /// number that fits in `u32`. Nothing is floored or clamped.
    fn try_from(input: PointsConfigInput) -> Result<Self, Self::Error> {
        Ok(Self {
            lettuce: validate_weight("lettuce", input.lettuce)?,
            carrot: validate_weight("carrot", input.carrot)?,
            playing: validate_weight("playing", input.playing)?,
            repeat_playing: validate_weight("repeat_playing", input.repeat_playing)?,
        })
    }
}

fn validate_weight(field: &str, value: f64) -> Result<u32, HappinessError> {
    if !value.is_finite() {
        return Err(HappinessError::Validation(format!(
            "{field} must be a finite number"
        )));
    }
    if value < 0.0 {
        return Err(HappinessError::Validation(format!(
            "{field} must be non-negative, got {value}"
        )));
    }
    if value.fract() != 0.0 {
        return Err(HappinessError::Validation(format!(
            "{field} must be a whole number, got {value}"
        )));
    }
    if value > f64::from(u32::MAX) {
        return Err(HappinessError::Validation(format!(
            "{field} is too large, got {value}"
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let weight = value as u32;
    Ok(weight)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn input(lettuce: f64, carrot: f64, playing: f64, repeat_playing: f64) -> PointsConfigInput {
        PointsConfigInput {
            lettuce,
            carrot,
            playing,
            repeat_playing,
        }
    }

    #[test]
    fn defaults_match_dashboard_defaults() {
        let config = PointsConfig::default();
        assert_eq!(config.for_food(FoodType::Lettuce), 1);
        assert_eq!(config.for_food(FoodType::Carrot), 3);
        assert_eq!(config.for_play(false), 2);
        assert_eq!(config.for_play(true), 4);
    }

    #[test]
    fn accepts_whole_non_negative_values() {
        let Ok(config) = PointsConfig::try_from(input(0.0, 5.0, 2.0, 10.0)) else {
            panic!("valid config rejected");
        };
        assert_eq!(config.carrot, 5);
        assert_eq!(config.lettuce, 0);
    }

    #[test]
    fn rejects_negative_values() {
        let err = PointsConfig::try_from(input(1.0, -3.0, 2.0, 4.0));
        assert!(matches!(err, Err(HappinessError::Validation(msg)) if msg.contains("carrot")));
    }

    #[test]
    fn rejects_fractional_and_non_finite_values() {
        assert!(PointsConfig::try_from(input(1.5, 3.0, 2.0, 4.0)).is_err());
        assert!(PointsConfig::try_from(input(1.0, 3.0, f64::NAN, 4.0)).is_err());
        assert!(PointsConfig::try_from(input(1.0, 3.0, 2.0, f64::INFINITY)).is_err());
        assert!(PointsConfig::try_from(input(1.0, 3.0, 2.0, 1e12)).is_err());
    }

    #[test]
    fn round_trips_through_input() {
        let config = PointsConfig::default();
        assert_eq!(
            PointsConfig::try_from(PointsConfigInput::from(config)).ok(),
            Some(config)
        );
    }
}
