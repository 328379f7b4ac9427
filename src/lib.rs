//! # bunny-happiness
//!
//! Happiness accounting for virtual pet bunnies, served over REST and
//! WebSocket.
//!
//! Every feed or play appends an immutable event to a ledger and adds the
//! points it earned to the participants' happiness (0–100). Changing the
//! points table replays each bunny's full history under the new weights.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── HappinessService (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── HappinessEngine (domain/)
//!     │
//!     └── Storage: MemoryStore | PostgresStore (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
