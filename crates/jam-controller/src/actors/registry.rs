//! `RegistryActor` - top-level actor that owns the room table.
//!
//! The registry:
//! - Lazily creates `RoomActor`s, hydrating roster and song from the store
//! - Creates sessions (admin only) and announces them globally
//! - Remembers ended session ids so a late join fails with the session
//!   ended error instead of a plain not-found
//! - Owns the global fan-out set used for `sessionCreated`
//! - Reaps rooms whose tasks have finished (ended or idle-evicted)
//!
//! There is exactly one registry per process. Room lookups go through its
//! mailbox, but per-room operations then talk to the room handle directly,
//! so the registry is not on the hot path for joins and broadcasts.

use super::messages::{RegistryMessage, RegistryStatus};
use super::observer::{FanoutSet, ObserverHandle, ObserverId};
use super::room::{RoomActor, RoomHandle};
use crate::errors::JcError;
use crate::gateway::protocol::ServerEvent;
use crate::models::{NewSession, Participant, SessionRecord, User};
use crate::store::SessionStore;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// How long graceful shutdown waits for each room task.
const ROOM_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A room actor tracked by the registry.
struct ManagedRoom {
    handle: RoomHandle,
    task_handle: JoinHandle<()>,
}

/// Handle to the `RegistryActor`.
#[derive(Clone, Debug)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RegistryHandle {
    /// Create a new registry actor and return a handle to it.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, store_timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RegistryActor {
            receiver,
            cancel_token: cancel_token.clone(),
            rooms: HashMap::new(),
            ended: HashSet::new(),
            global: FanoutSet::new(),
            store,
            store_timeout,
            is_draining: false,
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Get the room for a session id, hydrating it from the store if it is
    /// not live. Fails with `NotFound` for unknown ids and `SessionEnded`
    /// for ids that ended during this process's lifetime.
    pub async fn ensure_room(&self, session_id: String) -> Result<RoomHandle, JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::EnsureRoom {
                session_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Look up a live room without creating one.
    pub async fn room(&self, session_id: String) -> Result<Option<RoomHandle>, JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetRoom {
                session_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))
    }

    /// Create a session. Admin only; broadcasts `sessionCreated` globally.
    pub async fn create_session(
        &self,
        new_session: NewSession,
        acting_user: User,
    ) -> Result<SessionRecord, JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::CreateSession {
                new_session,
                acting_user,
                respond_to: tx,
            })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))?
    }

    /// End a session. Admin only; terminal for the session id.
    pub async fn end_session(
        &self,
        session_id: String,
        acting_user: User,
    ) -> Result<(), JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::EndSession {
                session_id,
                acting_user,
                respond_to: tx,
            })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Register a connection for global broadcasts.
    pub async fn register_global(&self, observer: ObserverHandle) -> Result<(), JcError> {
        self.sender
            .send(RegistryMessage::RegisterGlobal { observer })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))
    }

    /// Remove a connection from the global broadcast set.
    pub async fn unregister_global(&self, observer_id: ObserverId) -> Result<(), JcError> {
        self.sender
            .send(RegistryMessage::UnregisterGlobal { observer_id })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))
    }

    /// Remove a user from every session they appear in (logout cleanup).
    pub async fn remove_user_everywhere(&self, user_id: String) -> Result<(), JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::RemoveUserEverywhere {
                user_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get the current registry status.
    pub async fn status(&self) -> Result<RegistryStatus, JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::Status { respond_to: tx })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the registry and, through child tokens, every room.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the registry is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `RegistryActor` implementation.
struct RegistryActor {
    receiver: mpsc::Receiver<RegistryMessage>,
    cancel_token: CancellationToken,
    /// Live rooms by session id. Entries whose task has finished are reaped
    /// lazily before each message.
    rooms: HashMap<String, ManagedRoom>,
    /// Session ids ended during this process's lifetime.
    ended: HashSet<String>,
    /// Observers receiving global broadcasts.
    global: FanoutSet,
    store: Arc<dyn SessionStore>,
    store_timeout: Duration,
    is_draining: bool,
}

impl RegistryActor {
    /// Run the actor message loop.
    #[instrument(skip_all, name = "jc.actor.registry")]
    async fn run(mut self) {
        info!(target: "jc.actor.registry", "RegistryActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "jc.actor.registry",
                        "RegistryActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.reap_finished_rooms();
                            self.handle_message(message).await;
                        }
                        None => {
                            info!(
                                target: "jc.actor.registry",
                                "RegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.graceful_shutdown().await;
        info!(target: "jc.actor.registry", "RegistryActor stopped");
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::EnsureRoom {
                session_id,
                respond_to,
            } => {
                let result = self.ensure_room(&session_id).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::GetRoom {
                session_id,
                respond_to,
            } => {
                let handle = self
                    .rooms
                    .get(&session_id)
                    .filter(|managed| !managed.task_handle.is_finished())
                    .map(|managed| managed.handle.clone());
                let _ = respond_to.send(handle);
            }

            RegistryMessage::CreateSession {
                new_session,
                acting_user,
                respond_to,
            } => {
                let result = self.handle_create_session(new_session, acting_user).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::EndSession {
                session_id,
                acting_user,
                respond_to,
            } => {
                let result = self.handle_end_session(&session_id, acting_user).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::RegisterGlobal { observer } => {
                debug!(
                    target: "jc.actor.registry",
                    observer_id = %observer.id(),
                    "Registering global observer"
                );
                self.global.subscribe(observer);
                metrics::gauge!("jc_global_observers").set(self.global.len() as f64);
            }

            RegistryMessage::UnregisterGlobal { observer_id } => {
                self.global.unsubscribe(observer_id);
                metrics::gauge!("jc_global_observers").set(self.global.len() as f64);
            }

            RegistryMessage::RemoveUserEverywhere {
                user_id,
                respond_to,
            } => {
                let result = self.handle_remove_user_everywhere(&user_id).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::Status { respond_to } => {
                let _ = respond_to.send(RegistryStatus {
                    room_count: self.rooms.len(),
                    global_observer_count: self.global.len(),
                    is_draining: self.is_draining,
                });
            }
        }
    }

    /// Get the live room for a session id, hydrating it from the store if
    /// needed.
    async fn ensure_room(&mut self, session_id: &str) -> Result<RoomHandle, JcError> {
        if self.ended.contains(session_id) {
            return Err(JcError::SessionEnded);
        }

        if let Some(managed) = self.rooms.get(session_id) {
            if !managed.task_handle.is_finished() {
                return Ok(managed.handle.clone());
            }
        }
        self.rooms.remove(session_id);

        let record = self
            .with_timeout(self.store.fetch_session(session_id))
            .await?
            .ok_or_else(|| JcError::NotFound("Session not found".to_string()))?;

        info!(
            target: "jc.actor.registry",
            session_id = %session_id,
            roster = record.participants.len(),
            "Hydrating room from store"
        );
        Ok(self.spawn_room(record))
    }

    /// Create a session and spawn its room with the creator on the roster.
    async fn handle_create_session(
        &mut self,
        new_session: NewSession,
        acting_user: User,
    ) -> Result<SessionRecord, JcError> {
        if self.is_draining {
            return Err(JcError::Internal("registry is draining".to_string()));
        }
        if !acting_user.is_admin() {
            return Err(JcError::Forbidden(
                "Only admins can create sessions".to_string(),
            ));
        }

        let creator = Participant::from(acting_user);
        let record = self
            .with_timeout(self.store.insert_session(&new_session, &creator))
            .await?;

        info!(
            target: "jc.actor.registry",
            session_id = %record.meta.id,
            name = %record.meta.name,
            "Session created"
        );
        let _ = self.spawn_room(record.clone());
        metrics::counter!("jc_sessions_created_total").increment(1);

        self.global
            .broadcast(&ServerEvent::SessionCreated(record.clone()), None);

        Ok(record)
    }

    /// End a session through its room actor and remember the id as ended.
    async fn handle_end_session(
        &mut self,
        session_id: &str,
        acting_user: User,
    ) -> Result<(), JcError> {
        let handle = self.ensure_room(session_id).await?;
        handle.end_session(acting_user).await?;

        self.ended.insert(session_id.to_string());
        if let Some(managed) = self.rooms.remove(session_id) {
            // The room's run loop exits on its own after a successful end.
            Self::await_room_exit(session_id.to_string(), managed.task_handle);
        }
        metrics::counter!("jc_sessions_ended_total").increment(1);

        Ok(())
    }

    /// Remove a user from every session they appear in. Failures on
    /// individual sessions are logged and the sweep continues.
    async fn handle_remove_user_everywhere(&mut self, user_id: &str) -> Result<(), JcError> {
        let records = self.with_timeout(self.store.list_sessions()).await?;

        for record in records {
            if !record.participants.iter().any(|p| p.id == user_id) {
                continue;
            }

            let live = self
                .rooms
                .get(&record.meta.id)
                .filter(|managed| !managed.task_handle.is_finished())
                .map(|managed| managed.handle.clone());

            let result = match live {
                // The room broadcasts participantLeft itself.
                Some(room) => room.leave(user_id.to_string(), None).await,
                None => {
                    self.with_timeout(
                        self.store.delete_participant(&record.meta.id, user_id),
                    )
                    .await
                }
            };

            if let Err(err) = result {
                warn!(
                    target: "jc.actor.registry",
                    session_id = %record.meta.id,
                    user_id = %user_id,
                    error = %err,
                    "Failed to remove user from session during logout sweep"
                );
            }
        }

        Ok(())
    }

    /// Spawn a room actor for a record and track it.
    fn spawn_room(&mut self, record: SessionRecord) -> RoomHandle {
        let session_id = record.meta.id.clone();
        let (handle, task_handle) = RoomActor::spawn(
            record,
            Arc::clone(&self.store),
            self.store_timeout,
            self.cancel_token.child_token(),
        );

        self.rooms.insert(
            session_id,
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
            },
        );

        handle
    }

    /// Drop table entries whose room task has finished (ended sessions and
    /// idle-evicted rooms).
    fn reap_finished_rooms(&mut self) {
        let finished: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(session_id, _)| session_id.clone())
            .collect();

        for session_id in finished {
            if let Some(managed) = self.rooms.remove(&session_id) {
                debug!(
                    target: "jc.actor.registry",
                    session_id = %session_id,
                    "Reaping finished room"
                );
                Self::await_room_exit(session_id, managed.task_handle);
            }
        }
    }

    /// Observe a finished (or finishing) room task off the registry's own
    /// loop so a panicked room is logged rather than silently dropped.
    fn await_room_exit(session_id: String, task_handle: JoinHandle<()>) {
        tokio::spawn(async move {
            match tokio::time::timeout(ROOM_SHUTDOWN_TIMEOUT, task_handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        target: "jc.actor.registry",
                        session_id = %session_id,
                        error = %e,
                        "Room task ended abnormally"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "jc.actor.registry",
                        session_id = %session_id,
                        "Timed out waiting for room task to exit"
                    );
                }
            }
        });
    }

    /// Gracefully shut down all rooms.
    async fn graceful_shutdown(&mut self) {
        self.is_draining = true;
        let count = self.rooms.len();
        info!(
            target: "jc.actor.registry",
            rooms = count,
            "Shutting down rooms"
        );

        // Child tokens are already cancelled with the registry token; wait
        // for each task to notice.
        for (session_id, managed) in self.rooms.drain() {
            managed.handle.cancel();
            match tokio::time::timeout(ROOM_SHUTDOWN_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "jc.actor.registry",
                        session_id = %session_id,
                        "Room shut down"
                    );
                }
                Ok(Err(e)) => {
                    error!(
                        target: "jc.actor.registry",
                        session_id = %session_id,
                        error = %e,
                        "Room task failed during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "jc.actor.registry",
                        session_id = %session_id,
                        "Room did not shut down within timeout"
                    );
                }
            }
        }

        let _ = self.global.drain();
    }

    /// Run a store call under the configured timeout.
    async fn with_timeout<T, F>(&self, fut: F) -> Result<T, JcError>
    where
        F: Future<Output = Result<T, JcError>> + Send,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(JcError::Persistence(
                "session store call timed out".to_string(),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::Song;
    use crate::jc_test_utils::{
        fixtures::{admin, new_session, player, session_record},
        MemorySessionStore, TestObserver,
    };

    const STORE_TIMEOUT: Duration = Duration::from_secs(5);

    fn registry(store: Arc<MemorySessionStore>) -> RegistryHandle {
        RegistryHandle::new(store, STORE_TIMEOUT)
    }

    #[tokio::test]
    async fn test_create_session_requires_admin() {
        let store = MemorySessionStore::new();
        let registry = registry(Arc::clone(&store));

        let result = registry
            .create_session(new_session("Friday Jam", 4), player("alice"))
            .await;
        assert!(matches!(result, Err(JcError::Forbidden(_))));
        assert!(store.list_sessions_sync().is_empty());

        registry.cancel();
    }

    #[tokio::test]
    async fn test_create_session_persists_spawns_room_and_announces() {
        let store = MemorySessionStore::new();
        let registry = registry(Arc::clone(&store));

        let mut lobby = TestObserver::new();
        registry.register_global(lobby.observer()).await.unwrap();

        let record = registry
            .create_session(new_session("Friday Jam", 4), admin())
            .await
            .expect("create should succeed");

        assert_eq!(record.meta.name, "Friday Jam");
        assert_eq!(record.participants.len(), 1);
        assert!(record
            .participants
            .iter()
            .any(|p| p.role == crate::models::Role::Admin));

        match lobby.recv().await {
            ServerEvent::SessionCreated(announced) => {
                assert_eq!(announced.meta.id, record.meta.id);
            }
            other => panic!("expected sessionCreated, got {other:?}"),
        }

        // Room is live without a separate ensure call.
        let room = registry.room(record.meta.id.clone()).await.unwrap();
        assert!(room.is_some());

        // Persisted with the creator on the roster.
        let stored = store.fetch_session_sync(&record.meta.id).unwrap();
        assert_eq!(stored.participants.len(), 1);

        registry.cancel();
    }

    #[tokio::test]
    async fn test_ensure_room_unknown_session_fails_not_found() {
        let store = MemorySessionStore::new();
        let registry = registry(store);

        let result = registry.ensure_room("nope".to_string()).await;
        assert!(matches!(result, Err(JcError::NotFound(_))));

        registry.cancel();
    }

    #[tokio::test]
    async fn test_ensure_room_hydrates_from_store() {
        let record = session_record("jam-a", 4, vec![admin().into()]);
        let store = MemorySessionStore::with_sessions(vec![record]);
        let registry = registry(store);

        let room = registry
            .ensure_room("jam-a".to_string())
            .await
            .expect("hydration should succeed");

        let view = room.snapshot().await.unwrap();
        assert_eq!(view.participants.len(), 1);

        // Second call returns the live room, not a fresh hydration.
        let again = registry.ensure_room("jam-a".to_string()).await.unwrap();
        assert_eq!(again.session_id(), room.session_id());

        registry.cancel();
    }

    #[tokio::test]
    async fn test_ensure_room_rehydrates_after_idle_eviction() {
        let record = session_record("jam-b", 4, vec![]);
        let store = MemorySessionStore::with_sessions(vec![record]);
        let registry = registry(store);

        let room = registry.ensure_room("jam-b".to_string()).await.unwrap();
        let mut obs = TestObserver::new();
        room.join(player("alice"), obs.observer()).await.unwrap();
        room.leave("alice".to_string(), Some(obs.id())).await.unwrap();

        // The idle room exits; a later ensure spawns a fresh one.
        for _ in 0..100 {
            if registry.room("jam-b".to_string()).await.unwrap().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let room = registry.ensure_room("jam-b".to_string()).await.unwrap();
        let view = room.snapshot().await.unwrap();
        assert!(view.participants.is_empty());

        registry.cancel();
    }

    #[tokio::test]
    async fn test_end_session_is_terminal_for_the_id() {
        let store = MemorySessionStore::new();
        let registry = registry(Arc::clone(&store));

        let record = registry
            .create_session(new_session("Friday Jam", 4), admin())
            .await
            .unwrap();
        let session_id = record.meta.id;

        registry
            .end_session(session_id.clone(), admin())
            .await
            .expect("end should succeed");
        assert!(store.fetch_session_sync(&session_id).is_none());

        // Joins and further ends now fail as ended, not as not-found.
        let result = registry.ensure_room(session_id.clone()).await;
        assert!(matches!(result, Err(JcError::SessionEnded)));
        let result = registry.end_session(session_id, admin()).await;
        assert!(matches!(result, Err(JcError::SessionEnded)));

        registry.cancel();
    }

    #[tokio::test]
    async fn test_end_session_requires_admin() {
        let store = MemorySessionStore::new();
        let registry = registry(Arc::clone(&store));

        let record = registry
            .create_session(new_session("Friday Jam", 4), admin())
            .await
            .unwrap();

        let result = registry
            .end_session(record.meta.id.clone(), player("alice"))
            .await;
        assert!(matches!(result, Err(JcError::Forbidden(_))));
        assert!(store.fetch_session_sync(&record.meta.id).is_some());

        registry.cancel();
    }

    #[tokio::test]
    async fn test_end_session_unknown_fails_not_found() {
        let store = MemorySessionStore::new();
        let registry = registry(store);

        let result = registry.end_session("nope".to_string(), admin()).await;
        assert!(matches!(result, Err(JcError::NotFound(_))));

        registry.cancel();
    }

    #[tokio::test]
    async fn test_remove_user_everywhere_sweeps_live_and_cold_sessions() {
        // alice is in a cold (store-only) session and a live one.
        let cold = session_record("cold", 4, vec![admin().into(), player("alice").into()]);
        let live = session_record("live", 4, vec![admin().into()]);
        let store = MemorySessionStore::with_sessions(vec![cold, live]);
        let registry = registry(Arc::clone(&store));

        let room = registry.ensure_room("live".to_string()).await.unwrap();
        let mut host = TestObserver::new();
        room.join(admin(), host.observer()).await.unwrap();
        let mut alice_obs = TestObserver::new();
        room.join(player("alice"), alice_obs.observer()).await.unwrap();
        let _ = host.recv().await;

        registry
            .remove_user_everywhere("alice".to_string())
            .await
            .unwrap();

        // Live room broadcast the departure and corrected its roster.
        match host.recv().await {
            ServerEvent::ParticipantLeft(stub) => assert_eq!(stub.id, "alice"),
            other => panic!("expected participantLeft, got {other:?}"),
        }
        let view = room.snapshot().await.unwrap();
        assert_eq!(view.participants.len(), 1);

        // Cold session cleaned directly in the store.
        let stored = store.fetch_session_sync("cold").unwrap();
        assert!(stored.participants.iter().all(|p| p.id != "alice"));

        registry.cancel();
    }

    #[tokio::test]
    async fn test_unregister_global_stops_announcements() {
        let store = MemorySessionStore::new();
        let registry = registry(store);

        let mut lobby = TestObserver::new();
        registry.register_global(lobby.observer()).await.unwrap();
        registry.unregister_global(lobby.id()).await.unwrap();

        let _ = registry
            .create_session(new_session("Quiet Jam", 4), admin())
            .await
            .unwrap();

        let status = registry.status().await.unwrap();
        assert_eq!(status.global_observer_count, 0);
        assert!(lobby.try_recv().is_none());

        registry.cancel();
    }

    #[tokio::test]
    async fn test_status_reports_rooms_and_observers() {
        let store = MemorySessionStore::new();
        let registry = registry(store);

        let mut lobby = TestObserver::new();
        registry.register_global(lobby.observer()).await.unwrap();
        let _ = registry
            .create_session(new_session("Friday Jam", 4), admin())
            .await
            .unwrap();

        let status = registry.status().await.unwrap();
        assert_eq!(status.room_count, 1);
        assert_eq!(status.global_observer_count, 1);
        assert!(!status.is_draining);

        registry.cancel();
    }

    #[tokio::test]
    async fn test_change_song_through_hydrated_room() {
        let record = session_record("jam-c", 4, vec![admin().into()]);
        let store = MemorySessionStore::with_sessions(vec![record]);
        let registry = registry(Arc::clone(&store));

        let room = registry.ensure_room("jam-c".to_string()).await.unwrap();
        room.change_song(
            Some(Song {
                title: "Money".to_string(),
                artist: "Pink Floyd".to_string(),
            }),
            admin(),
        )
        .await
        .unwrap();

        let stored = store.fetch_session_sync("jam-c").unwrap();
        assert_eq!(stored.meta.song.unwrap().title, "Money");

        registry.cancel();
    }
}
