//! Session store boundary.
//!
//! The store is the durable source of truth for session metadata and roster
//! membership. Rooms treat it as a request/response collaborator: every
//! roster mutation is persisted here before the in-memory view changes
//! (except best-effort cleanup on disconnect, where the cache is corrected
//! even if the store write fails).
//!
//! Implementations: [`postgres::PgSessionStore`] for production, and an
//! in-memory store in the `jc-test-utils` crate for tests.

pub mod postgres;

pub use postgres::PgSessionStore;

use crate::errors::JcError;
use crate::models::{NewSession, Participant, SessionRecord, Song};

use async_trait::async_trait;

/// Durable storage for sessions and rosters.
///
/// All operations are request/response; implementations provide their own
/// consistency for concurrent writes to the same row (last-write-wins is
/// acceptable for song changes).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch one session with its roster, ordered by join time.
    async fn fetch_session(&self, session_id: &str) -> Result<Option<SessionRecord>, JcError>;

    /// List all sessions with their rosters.
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, JcError>;

    /// Insert a session row plus its creator as the initial participant.
    /// The store assigns the session id and creation timestamp.
    async fn insert_session(
        &self,
        new_session: &NewSession,
        creator: &Participant,
    ) -> Result<SessionRecord, JcError>;

    /// Insert a roster row for (session, user).
    async fn insert_participant(
        &self,
        session_id: &str,
        participant: &Participant,
    ) -> Result<(), JcError>;

    /// Delete the roster row for (session, user). Deleting an absent row
    /// is not an error.
    async fn delete_participant(&self, session_id: &str, user_id: &str) -> Result<(), JcError>;

    /// Update the session's selected song (`None` clears it).
    async fn update_song(&self, session_id: &str, song: Option<&Song>) -> Result<(), JcError>;

    /// Delete the session row (and, via cascade, its roster).
    async fn delete_session(&self, session_id: &str) -> Result<(), JcError>;
}
