//! Mailbox messages and reply types for the registry and room actors.

use super::observer::{ObserverHandle, ObserverId};
use crate::errors::JcError;
use crate::models::{NewSession, Participant, SessionRecord, Song, User};

use tokio::sync::oneshot;

/// The roster view returned to a joining observer (replayed as the
/// point-to-point `sessionState` event) and by snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterView {
    /// Participants in first-join order.
    pub participants: Vec<Participant>,
    /// Currently selected song, if any.
    pub active_song: Option<Song>,
}

/// Messages handled by a `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// A user joins through a live connection. The observer is subscribed
    /// to the room's fan-out set on success (and on idempotent re-join).
    Join {
        user: User,
        observer: ObserverHandle,
        respond_to: oneshot::Sender<Result<RosterView, JcError>>,
    },

    /// Explicit leave. `observer_id` unsubscribes the caller's connection;
    /// absent for REST-triggered removals (logout sweep).
    Leave {
        user_id: String,
        observer_id: Option<ObserverId>,
        respond_to: oneshot::Sender<Result<(), JcError>>,
    },

    /// A connection dropped without an explicit leave. Presence is removed
    /// only when this was the last observer bound to that user.
    Disconnect { observer_id: ObserverId },

    /// Admin changes (or clears) the selected song.
    ChangeSong {
        song: Option<Song>,
        acting_user: User,
        respond_to: oneshot::Sender<Result<(), JcError>>,
    },

    /// Admin ends the session; terminal.
    EndSession {
        acting_user: User,
        respond_to: oneshot::Sender<Result<(), JcError>>,
    },

    /// Current roster and song.
    Snapshot {
        respond_to: oneshot::Sender<RosterView>,
    },

    /// Subscribe an observer to room events without joining the roster.
    Subscribe { observer: ObserverHandle },

    /// Unsubscribe an observer; no effect if absent.
    Unsubscribe { observer_id: ObserverId },
}

/// Messages handled by the `RegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Get (lazily creating and hydrating from the store) the room for a
    /// session id.
    EnsureRoom {
        session_id: String,
        respond_to: oneshot::Sender<Result<super::room::RoomHandle, JcError>>,
    },

    /// Look up a live room without creating one.
    GetRoom {
        session_id: String,
        respond_to: oneshot::Sender<Option<super::room::RoomHandle>>,
    },

    /// Admin creates a session; persists, spawns the room with the creator
    /// as initial participant, and broadcasts `sessionCreated` globally.
    CreateSession {
        new_session: NewSession,
        acting_user: User,
        respond_to: oneshot::Sender<Result<SessionRecord, JcError>>,
    },

    /// Admin ends a session. Routed through the registry so the session id
    /// is remembered as ended and later joins fail with `SessionEnded`
    /// rather than `NotFound`.
    EndSession {
        session_id: String,
        acting_user: User,
        respond_to: oneshot::Sender<Result<(), JcError>>,
    },

    /// Register a connection for global broadcasts (`sessionCreated`).
    RegisterGlobal { observer: ObserverHandle },

    /// Remove a connection from the global broadcast set.
    UnregisterGlobal { observer_id: ObserverId },

    /// Remove a user from every session (logout cleanup).
    RemoveUserEverywhere {
        user_id: String,
        respond_to: oneshot::Sender<Result<(), JcError>>,
    },

    /// Current registry status.
    Status {
        respond_to: oneshot::Sender<RegistryStatus>,
    },
}

/// Registry status snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStatus {
    /// Number of live rooms.
    pub room_count: usize,
    /// Number of globally registered observers.
    pub global_observer_count: usize,
    /// Whether the registry is shutting down.
    pub is_draining: bool,
}
