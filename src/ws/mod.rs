//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams [`crate::domain::ChangeEvent`]s
//! to clients subscribed by bunny id (or `"*"`), and answers read-only
//! queries for bunny state and the points table.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
