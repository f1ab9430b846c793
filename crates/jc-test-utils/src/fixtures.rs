//! User and session fixtures.

use chrono::Utc;
use jam_controller::models::{NewSession, Participant, Role, SessionMeta, SessionRecord, User};

/// The session host: an admin on guitar.
#[must_use]
pub fn admin() -> User {
    User {
        id: "admin-1".to_string(),
        username: "host".to_string(),
        instrument: Some("guitar".to_string()),
        role: Role::Admin,
    }
}

/// A regular user with no declared instrument; id and username both take
/// the given name.
#[must_use]
pub fn player(name: &str) -> User {
    User {
        id: name.to_string(),
        username: name.to_string(),
        instrument: None,
        role: Role::User,
    }
}

/// A session record with the given id, capacity, and roster.
#[must_use]
pub fn session_record(id: &str, max_participants: u32, participants: Vec<Participant>) -> SessionRecord {
    SessionRecord {
        meta: SessionMeta {
            id: id.to_string(),
            name: format!("{id} session"),
            description: String::new(),
            genre: "rock".to_string(),
            max_participants,
            created_by: "admin-1".to_string(),
            created_at: Utc::now(),
            song: None,
        },
        participants,
    }
}

/// A create-session request payload.
#[must_use]
pub fn new_session(name: &str, max_participants: u32) -> NewSession {
    NewSession {
        name: name.to_string(),
        description: String::new(),
        genre: "rock".to_string(),
        max_participants,
        song: None,
    }
}
