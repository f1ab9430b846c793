//! Wire protocol for the WebSocket gateway.
//!
//! Frames are JSON objects tagged by `event`, with the payload under `data`,
//! matching the event table the web client speaks:
//!
//! | Event | Direction |
//! |---|---|
//! | `joinSession`, `leaveSession` | inbound |
//! | `sessionState`, `error` | outbound, point-to-point |
//! | `participantJoined`, `participantLeft`, `songChanged`, `sessionEnded` | outbound, room broadcast |
//! | `sessionCreated` | outbound, global broadcast |

use crate::models::{Participant, SessionRecord, Song, User};
use serde::{Deserialize, Serialize};

/// Inbound frame from a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Request to join a session's room.
    #[serde(rename_all = "camelCase")]
    JoinSession { session_id: String, user: User },

    /// Request to leave a session's room.
    #[serde(rename_all = "camelCase")]
    LeaveSession { session_id: String, user: User },
}

/// Identifying stub sent with `participantLeft`. Carries the full
/// participant details when the room still had them, id-only otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantStub {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
}

impl From<&Participant> for ParticipantStub {
    fn from(participant: &Participant) -> Self {
        Self {
            id: participant.id.clone(),
            username: Some(participant.username.clone()),
            instrument: Some(participant.instrument.clone()),
        }
    }
}

impl ParticipantStub {
    /// Id-only stub, for removals where the roster entry is already gone.
    #[must_use]
    pub fn id_only(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            instrument: None,
        }
    }
}

/// Outbound event delivered to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full session view, sent point-to-point to a newly joined observer.
    #[serde(rename_all = "camelCase")]
    SessionState {
        participants: Vec<Participant>,
        active_song: Option<Song>,
    },

    /// A participant joined; broadcast to every other room observer.
    ParticipantJoined(Participant),

    /// A participant left (explicit leave, disconnect, or logout sweep).
    ParticipantLeft(ParticipantStub),

    /// The active song changed; broadcast to all room observers.
    /// Field casing is historical: the web client expects `sessionId` but
    /// snake_case song fields.
    SongChanged {
        #[serde(rename = "sessionId")]
        session_id: String,
        song_title: Option<String>,
        song_artist: Option<String>,
    },

    /// The session was ended by an admin; terminal for the room.
    #[serde(rename_all = "camelCase")]
    SessionEnded { session_id: String, message: String },

    /// A session was created; broadcast to every connected observer.
    SessionCreated(SessionRecord),

    /// Operation failure, sent point-to-point to the initiating observer.
    Error { message: String },
}
