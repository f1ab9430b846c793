//! In-memory session store with failure injection.

use jam_controller::errors::JcError;
use jam_controller::models::{NewSession, Participant, SessionMeta, SessionRecord, Song};
use jam_controller::store::SessionStore;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

/// In-memory [`SessionStore`] for tests.
///
/// Write operations can be made to fail (`fail_writes`) or hang far past
/// any store timeout (`hang_writes`). Reads are never injected with
/// failures; tests that need a failing read can use a session id that does
/// not exist.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    fail_writes: AtomicBool,
    hang_writes: AtomicBool,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_sessions(Vec::new())
    }

    /// Create a store pre-seeded with session records.
    #[must_use]
    pub fn with_sessions(records: Vec<SessionRecord>) -> Arc<Self> {
        let sessions = records
            .into_iter()
            .map(|record| (record.meta.id.clone(), record))
            .collect();

        Arc::new(Self {
            sessions: Mutex::new(sessions),
            fail_writes: AtomicBool::new(false),
            hang_writes: AtomicBool::new(false),
        })
    }

    /// Make every write fail with a persistence error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every write hang far past any reasonable store timeout.
    pub fn hang_writes(&self, hang: bool) {
        self.hang_writes.store(hang, Ordering::SeqCst);
    }

    /// Synchronous read for assertions.
    #[must_use]
    pub fn fetch_session_sync(&self, session_id: &str) -> Option<SessionRecord> {
        self.lock().get(session_id).cloned()
    }

    /// Synchronous list for assertions, ordered by creation time.
    #[must_use]
    pub fn list_sessions_sync(&self) -> Vec<SessionRecord> {
        let mut records: Vec<SessionRecord> = self.lock().values().cloned().collect();
        records.sort_by_key(|record| record.meta.created_at);
        records
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.sessions.lock().expect("session store lock poisoned")
    }

    async fn write_gate(&self) -> Result<(), JcError> {
        if self.hang_writes.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(JcError::Persistence("injected store failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn fetch_session(&self, session_id: &str) -> Result<Option<SessionRecord>, JcError> {
        Ok(self.fetch_session_sync(session_id))
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>, JcError> {
        Ok(self.list_sessions_sync())
    }

    async fn insert_session(
        &self,
        new_session: &NewSession,
        creator: &Participant,
    ) -> Result<SessionRecord, JcError> {
        self.write_gate().await?;

        let record = SessionRecord {
            meta: SessionMeta {
                id: Uuid::new_v4().to_string(),
                name: new_session.name.clone(),
                description: new_session.description.clone(),
                genre: new_session.genre.clone(),
                max_participants: new_session.max_participants,
                created_by: creator.id.clone(),
                created_at: Utc::now(),
                song: new_session.song.clone(),
            },
            participants: vec![creator.clone()],
        };

        self.lock()
            .insert(record.meta.id.clone(), record.clone());
        Ok(record)
    }

    async fn insert_participant(
        &self,
        session_id: &str,
        participant: &Participant,
    ) -> Result<(), JcError> {
        self.write_gate().await?;

        let mut sessions = self.lock();
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| JcError::Persistence("session row missing".to_string()))?;

        if record.participants.iter().all(|p| p.id != participant.id) {
            record.participants.push(participant.clone());
        }
        Ok(())
    }

    async fn delete_participant(&self, session_id: &str, user_id: &str) -> Result<(), JcError> {
        self.write_gate().await?;

        if let Some(record) = self.lock().get_mut(session_id) {
            record.participants.retain(|p| p.id != user_id);
        }
        Ok(())
    }

    async fn update_song(&self, session_id: &str, song: Option<&Song>) -> Result<(), JcError> {
        self.write_gate().await?;

        let mut sessions = self.lock();
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| JcError::NotFound("Session not found".to_string()))?;

        record.meta.song = song.cloned();
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), JcError> {
        self.write_gate().await?;

        self.lock().remove(session_id);
        Ok(())
    }
}
