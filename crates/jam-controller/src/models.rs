//! Domain types shared across the store, actors, gateway, and HTTP surface.
//!
//! `Session`/`Participant` are the persisted shapes; `User` is what the
//! out-of-scope auth layer hands us on join and in the `x-jam-user` header.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Instrument assigned when a joining user does not declare one.
pub const DEFAULT_INSTRUMENT: &str = "vocals";

/// User role as issued by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Authenticated identity attached to a connection or HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Declared instrument; defaults to [`DEFAULT_INSTRUMENT`] on join.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    pub role: Role,
}

impl User {
    /// Whether this user may perform admin-only session operations.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A member of a session's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub username: String,
    pub instrument: String,
    pub role: Role,
}

impl From<User> for Participant {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            instrument: user
                .instrument
                .unwrap_or_else(|| DEFAULT_INSTRUMENT.to_string()),
            role: user.role,
        }
    }
}

/// The currently selected song for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub artist: String,
}

/// Session metadata as owned by the session store and cached by a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: String,
    pub name: String,
    pub description: String,
    pub genre: String,
    pub max_participants: u32,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song: Option<Song>,
}

/// A session together with its persisted roster, ordered by join time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(flatten)]
    pub meta: SessionMeta,
    pub participants: Vec<Participant>,
}

/// Request payload for creating a new session. The store assigns the id
/// and creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genre: String,
    pub max_participants: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song: Option<Song>,
}
