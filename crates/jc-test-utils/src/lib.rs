//! Test utilities for the jam controller.
//!
//! Provides an in-memory [`SessionStore`](jam_controller::store::SessionStore)
//! with failure injection, user and session fixtures, and a test observer
//! that wraps one gateway connection's event channel.

pub mod fixtures;
pub mod memory_store;
pub mod observers;

pub use memory_store::MemorySessionStore;
pub use observers::TestObserver;
