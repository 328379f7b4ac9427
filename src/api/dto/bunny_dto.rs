//! Bunny DTOs for create, edit, get and list operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{
    Bunny, BunnyEvent, BunnyId, BunnyProfileUpdate, Happiness, HappinessBand, NewBunny,
};
use crate::error::HappinessError;

/// Request body for `POST /bunnies`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBunnyRequest {
    /// Display name, 2–50 characters after trimming.
    pub name: String,
    /// Optional avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Starting happiness, 0–100. Defaults to 50.
    #[serde(default)]
    pub happiness: Option<i64>,
}

impl CreateBunnyRequest {
    /// Validates the request into a [`NewBunny`].
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Validation`] on any invalid field.
    pub fn into_new_bunny(self) -> Result<NewBunny, HappinessError> {
        let happiness = self.happiness.map(Happiness::try_new).transpose()?;
        NewBunny::parse(&self.name, self.avatar_url.as_deref(), happiness)
    }
}

/// Request body for `PATCH /bunnies/{id}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateBunnyRequest {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New avatar URL; an empty string clears it.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UpdateBunnyRequest {
    /// Validates the request into a [`BunnyProfileUpdate`].
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Validation`] on any invalid field or an
    /// empty edit.
    pub fn into_update(self) -> Result<BunnyProfileUpdate, HappinessError> {
        BunnyProfileUpdate::parse(self.name.as_deref(), self.avatar_url.as_deref())
    }
}

/// A bunny as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BunnyResponse {
    /// Bunny identifier.
    pub id: BunnyId,
    /// Display name.
    pub name: String,
    /// Avatar URL, if any.
    pub avatar_url: Option<String>,
    /// Current happiness, 0–100.
    pub happiness: Happiness,
    /// Coarse happiness level for display.
    pub band: HappinessBand,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<Bunny> for BunnyResponse {
    fn from(bunny: Bunny) -> Self {
        Self {
            id: bunny.id,
            name: bunny.name,
            avatar_url: bunny.avatar_url,
            band: bunny.happiness.band(),
            happiness: bunny.happiness,
            created_at: bunny.created_at,
            updated_at: bunny.updated_at,
        }
    }
}

/// Paginated list response for `GET /bunnies`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BunnyListResponse {
    /// Bunnies on this page, oldest first.
    pub data: Vec<BunnyResponse>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Response body for `GET /bunnies/{id}/events`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BunnyEventsResponse {
    /// Bunny whose history this is.
    pub bunny_id: BunnyId,
    /// Events the bunny took part in, oldest first.
    pub events: Vec<BunnyEvent>,
}
