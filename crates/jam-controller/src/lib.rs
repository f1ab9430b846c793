//! Jam Controller (JC) Service Library
//!
//! Core functionality for the Jam Controller - a stateful WebSocket
//! presence and event-broadcast server for live jam sessions:
//!
//! - Per-session roster tracking with single-writer serialization
//! - Point-to-point state replay on join, broadcasts for everyone else
//! - Global announcements when sessions are created
//! - Durable session state in Postgres, read-through cached per room
//! - HTTP API for session CRUD and user logout sweeps
//!
//! # Architecture
//!
//! The JC uses an actor model hierarchy:
//!
//! ```text
//! RegistryActor (singleton per JC instance)
//! ├── owns the room table and the global broadcast set
//! └── supervises N RoomActors
//!     └── RoomActor (one per live session)
//!         ├── owns roster, cached song, and subscriber set
//!         └── performs session store writes
//! ```
//!
//! # Key Design Decisions
//!
//! - **One room binding per connection**: joining a second session
//!   releases presence in the first
//! - **Postgres as source of truth**: rooms hydrate lazily from the store
//!   and persist before mutating their cache
//! - **Best-effort delivery**: a slow consumer loses events rather than
//!   blocking the room
//! - **Counted disconnects**: presence survives until the user's last
//!   connection in the room drops
//!
//! # Modules
//!
//! - [`actors`] - Registry and room actors
//! - [`gateway`] - WebSocket surface and wire protocol
//! - [`store`] - Durable session store (Postgres)
//! - [`handlers`] / [`routes`] - HTTP API
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with HTTP mappings

pub mod actors;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod routes;
pub mod store;

// Unit tests compile the jc-test-utils sources into this crate so the
// fixtures and the code under test share one set of types. Linking the
// jc-test-utils *crate* from unit tests would pull in a second build of
// jam-controller (dev-dependency cycle) whose types do not unify with
// `crate::`. The alias lets those sources' `jam_controller::` paths
// resolve to this test build. Integration tests in `tests/` keep using
// the jc-test-utils crate directly, where only one build exists.
#[cfg(test)]
extern crate self as jam_controller;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[path = "../../jc-test-utils/src/lib.rs"]
mod jc_test_utils;
