//! Service layer: business logic orchestration.
//!
//! [`HappinessService`] coordinates the bunny registry, the event ledger and
//! the points table, delegates scoring to the
//! [`super::domain::HappinessEngine`], and emits changes through the
//! [`super::domain::EventBus`].

pub mod activity;
pub mod bunny_locks;
pub mod happiness_service;
pub mod points;
pub mod recalculation;

pub use activity::{ActivityOutcome, HappinessUpdate};
pub use bunny_locks::{BunnyGuard, BunnyLocks};
pub use happiness_service::{DashboardStats, HappinessService};
pub use points::ConfigUpdate;
pub use recalculation::{
    BunnyImpact, BunnyRecalculation, ImpactReport, RecalculationFailure, RecalculationReport,
};

#[cfg(test)]
pub(crate) mod test_support;
