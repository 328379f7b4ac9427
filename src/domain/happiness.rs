//! Bounded happiness score.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::HappinessError;

/// A happiness score, always within `0..=100`.
///
/// The only ways to build one are [`Happiness::clamped`], which saturates,
/// and [`Happiness::try_new`], which rejects out-of-range values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, ToSchema,
)]
#[serde(transparent)]
pub struct Happiness(u8);

impl Happiness {
    /// Lowest possible score.
    pub const MIN: Self = Self(0);
    /// Highest possible score.
    pub const MAX: Self = Self(100);

    /// Clamps an arbitrary running total into `0..=100`.
    #[must_use]
    pub fn clamped(total: i64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = total.clamp(0, 100) as u8;
        Self(value)
    }

    /// Builds a score from a caller-supplied value.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Validation`] if `value` is outside `0..=100`.
    pub fn try_new(value: i64) -> Result<Self, HappinessError> {
        if (0..=100).contains(&value) {
            Ok(Self::clamped(value))
        } else {
            Err(HappinessError::Validation(format!(
                "happiness must be between 0 and 100, got {value}"
            )))
        }
    }

    /// Returns the raw score.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Applies a signed delta, saturating at the bounds.
    #[must_use]
    pub fn apply(self, delta: i64) -> Self {
        Self::clamped(i64::from(self.0).saturating_add(delta))
    }

    /// Signed difference `self - earlier`.
    #[must_use]
    pub fn delta_from(self, earlier: Self) -> i64 {
        i64::from(self.0) - i64::from(earlier.0)
    }

    /// Display band used by the dashboard meter.
    #[must_use]
    pub const fn band(self) -> HappinessBand {
        match self.0 {
            80.. => HappinessBand::High,
            50..=79 => HappinessBand::Medium,
            20..=49 => HappinessBand::Low,
            _ => HappinessBand::Critical,
        }
    }
}

impl fmt::Display for Happiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Happiness {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Self::try_new(raw).map_err(serde::de::Error::custom)
    }
}

/// Coarse happiness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HappinessBand {
    /// 80 and above.
    High,
    /// 50 to 79.
    Medium,
    /// 20 to 49.
    Low,
    /// Below 20.
    Critical,
}
