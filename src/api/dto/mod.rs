//! Data Transfer Objects for REST request/response serialization.
//!
//! Service result types (`ActivityOutcome`, `RecalculationReport`,
//! `ImpactReport`, `ConfigUpdate`) are serialized as-is; only request
//! bodies and bunny views get their own DTOs here.

pub mod activity_dto;
pub mod bunny_dto;
pub mod common_dto;

pub use activity_dto::*;
pub use bunny_dto::*;
pub use common_dto::*;
