//! Activity DTOs for feed and play.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{BunnyId, FoodType};

/// Request body for `POST /bunnies/{id}/feed`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct FeedRequest {
    /// What to feed.
    pub food_type: FoodType,
}

/// Request body for `POST /bunnies/{id}/play`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct PlayRequest {
    /// The other participant.
    pub playmate_bunny_id: BunnyId,
}
