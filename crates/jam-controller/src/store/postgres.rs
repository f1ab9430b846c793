//! Postgres-backed session store.
//!
//! Schema lives in `migrations/`. Rosters are ordered by `joined_at` so the
//! persisted order matches join order, and `(session_id, user_id)` is the
//! primary key so a duplicate insert surfaces as a store error rather than
//! a duplicate roster row.

use super::SessionStore;
use crate::errors::JcError;
use crate::models::{NewSession, Participant, Role, SessionMeta, SessionRecord, Song};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

/// SQL fragment for selecting all session fields.
const SESSION_SELECT_QUERY: &str = r"
    SELECT
        session_id,
        name,
        description,
        genre,
        max_participants,
        song_title,
        song_artist,
        created_by,
        created_at
    FROM jam_sessions
";

/// Postgres implementation of [`SessionStore`].
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_roster(&self, session_id: &str) -> Result<Vec<Participant>, JcError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, username, instrument, role
            FROM session_participants
            WHERE session_id = $1
            ORDER BY joined_at ASC
            ",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_participant).collect()
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn fetch_session(&self, session_id: &str) -> Result<Option<SessionRecord>, JcError> {
        let query = format!("{SESSION_SELECT_QUERY} WHERE session_id = $1");

        let Some(row) = sqlx::query(&query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let meta = map_row_to_meta(&row)?;
        let participants = self.fetch_roster(session_id).await?;

        Ok(Some(SessionRecord { meta, participants }))
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, JcError> {
        let query = format!("{SESSION_SELECT_QUERY} ORDER BY created_at ASC");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let meta = map_row_to_meta(row)?;
            let participants = self.fetch_roster(&meta.id).await?;
            records.push(SessionRecord { meta, participants });
        }

        Ok(records)
    }

    async fn insert_session(
        &self,
        new_session: &NewSession,
        creator: &Participant,
    ) -> Result<SessionRecord, JcError> {
        let session_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO jam_sessions
                (session_id, name, description, genre, max_participants,
                 song_title, song_artist, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&session_id)
        .bind(&new_session.name)
        .bind(&new_session.description)
        .bind(&new_session.genre)
        .bind(i64::from(new_session.max_participants))
        .bind(new_session.song.as_ref().map(|s| s.title.clone()))
        .bind(new_session.song.as_ref().map(|s| s.artist.clone()))
        .bind(&creator.id)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO session_participants
                (session_id, user_id, username, instrument, role, joined_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(&session_id)
        .bind(&creator.id)
        .bind(&creator.username)
        .bind(&creator.instrument)
        .bind(role_to_str(creator.role))
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SessionRecord {
            meta: SessionMeta {
                id: session_id,
                name: new_session.name.clone(),
                description: new_session.description.clone(),
                genre: new_session.genre.clone(),
                max_participants: new_session.max_participants,
                created_by: creator.id.clone(),
                created_at,
                song: new_session.song.clone(),
            },
            participants: vec![creator.clone()],
        })
    }

    async fn insert_participant(
        &self,
        session_id: &str,
        participant: &Participant,
    ) -> Result<(), JcError> {
        sqlx::query(
            r"
            INSERT INTO session_participants
                (session_id, user_id, username, instrument, role, joined_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (session_id, user_id) DO NOTHING
            ",
        )
        .bind(session_id)
        .bind(&participant.id)
        .bind(&participant.username)
        .bind(&participant.instrument)
        .bind(role_to_str(participant.role))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_participant(&self, session_id: &str, user_id: &str) -> Result<(), JcError> {
        sqlx::query(
            r"
            DELETE FROM session_participants
            WHERE session_id = $1 AND user_id = $2
            ",
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_song(&self, session_id: &str, song: Option<&Song>) -> Result<(), JcError> {
        let result = sqlx::query(
            r"
            UPDATE jam_sessions
            SET song_title = $2, song_artist = $3
            WHERE session_id = $1
            ",
        )
        .bind(session_id)
        .bind(song.map(|s| s.title.clone()))
        .bind(song.map(|s| s.artist.clone()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(JcError::NotFound("Session not found".to_string()));
        }

        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), JcError> {
        sqlx::query("DELETE FROM jam_sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Map a database row to session metadata.
fn map_row_to_meta(row: &PgRow) -> Result<SessionMeta, JcError> {
    let song = match (
        row.try_get::<Option<String>, _>("song_title")?,
        row.try_get::<Option<String>, _>("song_artist")?,
    ) {
        (Some(title), Some(artist)) => Some(Song { title, artist }),
        _ => None,
    };

    let max_participants: i64 = row.try_get("max_participants")?;

    Ok(SessionMeta {
        id: row.try_get("session_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        genre: row.try_get("genre")?,
        max_participants: u32::try_from(max_participants)
            .map_err(|_| JcError::Persistence("max_participants out of range".to_string()))?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        song,
    })
}

/// Map a roster row to a participant.
fn map_row_to_participant(row: &PgRow) -> Result<Participant, JcError> {
    let role: String = row.try_get("role")?;

    Ok(Participant {
        id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        instrument: row.try_get("instrument")?,
        role: role_from_str(&role),
    })
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::User => "user",
    }
}

fn role_from_str(role: &str) -> Role {
    match role {
        "admin" => Role::Admin,
        _ => Role::User,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(role_from_str(role_to_str(Role::Admin)), Role::Admin);
        assert_eq!(role_from_str(role_to_str(Role::User)), Role::User);
    }

    #[test]
    fn test_unknown_role_defaults_to_user() {
        assert_eq!(role_from_str("superuser"), Role::User);
    }
}
