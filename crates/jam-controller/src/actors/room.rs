//! `RoomActor` - per-session actor that owns live session state.
//!
//! Each `RoomActor`:
//! - Owns the roster (first-join order, unique by user id) and cached song
//! - Owns the room's observer fan-out set
//! - Performs session store calls - the only awaits in its message handling
//!
//! Because the actor processes one message at a time, all roster mutations
//! for a session are serialized without any lock shared across sessions.
//! Store calls are bounded by a timeout so a slow store fails the
//! triggering operation instead of wedging the room.
//!
//! # Disconnect handling
//!
//! The gateway reports a dropped connection with `Disconnect`. Presence is
//! removed only when that was the last live connection bound to the user in
//! this room, so a second browser tab keeps the user on the roster.

use super::messages::{RoomMessage, RosterView};
use super::observer::{FanoutSet, ObserverHandle, ObserverId};
use crate::errors::JcError;
use crate::gateway::protocol::{ParticipantStub, ServerEvent};
use crate::models::{Participant, SessionMeta, SessionRecord, Song, User};
use crate::store::SessionStore;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for the room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 256;

/// Message shown to observers when a session ends.
const SESSION_ENDED_MESSAGE: &str = "The session has ended.";

/// Handle to a `RoomActor`.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    session_id: String,
}

impl RoomHandle {
    /// Get the session ID.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Join a user through a live connection.
    ///
    /// Returns the full roster view for point-to-point `sessionState`
    /// replay to the joining observer. Idempotent for an already-present
    /// user: the observer is still subscribed but nothing is broadcast.
    pub async fn join(
        &self,
        user: User,
        observer: ObserverHandle,
    ) -> Result<RosterView, JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::Join {
                user,
                observer,
                respond_to: tx,
            })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Remove a user from the roster. No-op (not an error) if absent.
    pub async fn leave(
        &self,
        user_id: String,
        observer_id: Option<ObserverId>,
    ) -> Result<(), JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::Leave {
                user_id,
                observer_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Notify the room that a connection dropped without an explicit leave.
    pub async fn disconnect(&self, observer_id: ObserverId) -> Result<(), JcError> {
        self.sender
            .send(RoomMessage::Disconnect { observer_id })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))
    }

    /// Change (or clear) the selected song. Admin only.
    pub async fn change_song(
        &self,
        song: Option<Song>,
        acting_user: User,
    ) -> Result<(), JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::ChangeSong {
                song,
                acting_user,
                respond_to: tx,
            })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))?
    }

    /// End the session. Admin only; terminal.
    pub async fn end_session(&self, acting_user: User) -> Result<(), JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::EndSession {
                acting_user,
                respond_to: tx,
            })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get the current roster view.
    pub async fn snapshot(&self) -> Result<RosterView, JcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RoomMessage::Snapshot { respond_to: tx })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| JcError::Internal(format!("response receive failed: {e}")))
    }

    /// Subscribe an observer to room events without joining the roster.
    pub async fn subscribe(&self, observer: ObserverHandle) -> Result<(), JcError> {
        self.sender
            .send(RoomMessage::Subscribe { observer })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))
    }

    /// Unsubscribe an observer; no effect if absent.
    pub async fn unsubscribe(&self, observer_id: ObserverId) -> Result<(), JcError> {
        self.sender
            .send(RoomMessage::Unsubscribe { observer_id })
            .await
            .map_err(|e| JcError::Internal(format!("channel send failed: {e}")))
    }

    /// Cancel the room actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    /// Cached session metadata (read-through from the store).
    meta: SessionMeta,
    /// Roster in first-join order, unique by user id.
    roster: Vec<Participant>,
    /// Observers subscribed to this room's events.
    observers: FanoutSet,
    /// Back-references from joined observers to their user id, used to
    /// count live connections per user on disconnect.
    bindings: HashMap<ObserverId, String>,
    /// Message receiver.
    receiver: mpsc::Receiver<RoomMessage>,
    /// Cancellation token (child of the registry's token).
    cancel_token: CancellationToken,
    /// Durable store; persistence happens before in-memory mutation.
    store: Arc<dyn SessionStore>,
    /// Upper bound for one store call.
    store_timeout: Duration,
    /// Terminal flag; set by a successful end, never cleared.
    ended: bool,
}

impl RoomActor {
    /// Spawn a room actor hydrated from a store record.
    ///
    /// Returns a handle and the task join handle (the registry reaps the
    /// task when the room ends or goes idle).
    pub fn spawn(
        record: SessionRecord,
        store: Arc<dyn SessionStore>,
        store_timeout: Duration,
        cancel_token: CancellationToken,
    ) -> (RoomHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);
        let session_id = record.meta.id.clone();

        let actor = Self {
            meta: record.meta,
            roster: record.participants,
            observers: FanoutSet::new(),
            bindings: HashMap::new(),
            receiver,
            cancel_token: cancel_token.clone(),
            store,
            store_timeout,
            ended: false,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomHandle {
            sender,
            cancel_token,
            session_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "jc.actor.room", fields(session_id = %self.meta.id))]
    async fn run(mut self) {
        info!(
            target: "jc.actor.room",
            session_id = %self.meta.id,
            roster = self.roster.len(),
            "RoomActor started"
        );
        metrics::gauge!("jc_rooms").increment(1.0);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "jc.actor.room",
                        session_id = %self.meta.id,
                        "RoomActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message).await;

                            if self.ended {
                                break;
                            }
                            // Idle eviction: nothing cached, nobody watching.
                            if self.roster.is_empty() && self.observers.is_empty() {
                                debug!(
                                    target: "jc.actor.room",
                                    session_id = %self.meta.id,
                                    "Room idle, evicting"
                                );
                                break;
                            }
                        }
                        None => {
                            info!(
                                target: "jc.actor.room",
                                session_id = %self.meta.id,
                                "RoomActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        metrics::gauge!("jc_rooms").decrement(1.0);
        info!(
            target: "jc.actor.room",
            session_id = %self.meta.id,
            ended = self.ended,
            "RoomActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                user,
                observer,
                respond_to,
            } => {
                let result = self.handle_join(user, observer).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::Leave {
                user_id,
                observer_id,
                respond_to,
            } => {
                let result = self.handle_leave(&user_id, observer_id).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::Disconnect { observer_id } => {
                self.handle_disconnect(observer_id).await;
            }

            RoomMessage::ChangeSong {
                song,
                acting_user,
                respond_to,
            } => {
                let result = self.handle_change_song(song, &acting_user).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::EndSession {
                acting_user,
                respond_to,
            } => {
                let result = self.handle_end_session(&acting_user).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::Snapshot { respond_to } => {
                let _ = respond_to.send(self.view());
            }

            RoomMessage::Subscribe { observer } => {
                self.observers.subscribe(observer);
            }

            RoomMessage::Unsubscribe { observer_id } => {
                self.observers.unsubscribe(observer_id);
                self.bindings.remove(&observer_id);
            }
        }
    }

    /// Handle a join request.
    ///
    /// Order matters: terminal check, idempotency check, capacity check,
    /// persistence, then the in-memory mutation and broadcast. A failed
    /// persistence call leaves the roster untouched and nothing is
    /// broadcast, so other observers never see a partial mutation.
    #[instrument(skip_all, fields(session_id = %self.meta.id, user_id = %user.id))]
    async fn handle_join(
        &mut self,
        user: User,
        observer: ObserverHandle,
    ) -> Result<RosterView, JcError> {
        if self.ended {
            return Err(JcError::SessionEnded);
        }

        // Idempotent re-join: subscribe this connection, no re-insert,
        // no broadcast.
        if self.roster.iter().any(|p| p.id == user.id) {
            debug!(target: "jc.actor.room", "User already present, subscribing observer only");
            self.bindings.insert(observer.id(), user.id);
            self.observers.subscribe(observer);
            return Ok(self.view());
        }

        let capacity = usize::try_from(self.meta.max_participants).unwrap_or(usize::MAX);
        if self.roster.len() >= capacity {
            return Err(JcError::SessionFull);
        }

        let participant = Participant::from(user);
        self.persist(self.store.insert_participant(&self.meta.id, &participant))
            .await?;

        self.roster.push(participant.clone());
        self.bindings.insert(observer.id(), participant.id.clone());
        let joined_observer = observer.id();
        self.observers.subscribe(observer);
        self.observers.broadcast(
            &ServerEvent::ParticipantJoined(participant),
            Some(joined_observer),
        );
        metrics::counter!("jc_joins_total").increment(1);

        info!(
            target: "jc.actor.room",
            roster = self.roster.len(),
            "Participant joined"
        );

        Ok(self.view())
    }

    /// Handle an explicit leave (or a registry-driven removal when
    /// `observer_id` is `None`).
    ///
    /// Persistence here is best-effort: the in-memory roster must not
    /// retain a user whose connection is gone, so a store failure is
    /// logged and the cache is corrected anyway.
    #[instrument(skip_all, fields(session_id = %self.meta.id, user_id = %user_id))]
    async fn handle_leave(
        &mut self,
        user_id: &str,
        observer_id: Option<ObserverId>,
    ) -> Result<(), JcError> {
        if let Some(observer_id) = observer_id {
            self.observers.unsubscribe(observer_id);
            self.bindings.remove(&observer_id);
        }

        let Some(position) = self.roster.iter().position(|p| p.id == user_id) else {
            debug!(target: "jc.actor.room", "Leave for user not on roster, ignoring");
            return Ok(());
        };

        if let Err(err) = self
            .persist(self.store.delete_participant(&self.meta.id, user_id))
            .await
        {
            warn!(
                target: "jc.actor.room",
                error = %err,
                "Best-effort roster delete failed, correcting cache anyway"
            );
        }

        let participant = self.roster.remove(position);
        self.observers.broadcast(
            &ServerEvent::ParticipantLeft(ParticipantStub::from(&participant)),
            None,
        );

        info!(
            target: "jc.actor.room",
            roster = self.roster.len(),
            "Participant left"
        );

        Ok(())
    }

    /// Handle a dropped connection.
    ///
    /// Behaves exactly like a leave, except presence survives while the
    /// user still has another live connection bound to this room.
    async fn handle_disconnect(&mut self, observer_id: ObserverId) {
        self.observers.unsubscribe(observer_id);
        let Some(user_id) = self.bindings.remove(&observer_id) else {
            // Connection was watching but never joined.
            return;
        };

        if self.bindings.values().any(|bound| *bound == user_id) {
            debug!(
                target: "jc.actor.room",
                session_id = %self.meta.id,
                user_id = %user_id,
                "Other connections remain for user, keeping presence"
            );
            return;
        }

        debug!(
            target: "jc.actor.room",
            session_id = %self.meta.id,
            user_id = %user_id,
            "Last connection for user dropped, removing presence"
        );
        let _ = self.handle_leave(&user_id, None).await;
    }

    /// Handle a song change. Admin only; last-write-wins at the store.
    #[instrument(skip_all, fields(session_id = %self.meta.id))]
    async fn handle_change_song(
        &mut self,
        song: Option<Song>,
        acting_user: &User,
    ) -> Result<(), JcError> {
        if !acting_user.is_admin() {
            return Err(JcError::Forbidden(
                "Only admins can change the song".to_string(),
            ));
        }
        if self.ended {
            return Err(JcError::SessionEnded);
        }

        self.persist(self.store.update_song(&self.meta.id, song.as_ref()))
            .await?;
        self.meta.song = song.clone();

        // Everyone hears the change, including the acting admin's own
        // connections.
        self.observers.broadcast(
            &ServerEvent::SongChanged {
                session_id: self.meta.id.clone(),
                song_title: song.as_ref().map(|s| s.title.clone()),
                song_artist: song.map(|s| s.artist),
            },
            None,
        );

        info!(target: "jc.actor.room", "Song changed");
        Ok(())
    }

    /// Handle session end. Admin only; terminal.
    ///
    /// On success every observer hears `sessionEnded` and is then evicted
    /// from the fan-out set, so late-arriving events are impossible. The
    /// run loop exits afterwards and the registry reaps the entry.
    #[instrument(skip_all, fields(session_id = %self.meta.id))]
    async fn handle_end_session(&mut self, acting_user: &User) -> Result<(), JcError> {
        if !acting_user.is_admin() {
            return Err(JcError::Forbidden(
                "Only admins can end a session".to_string(),
            ));
        }
        if self.ended {
            return Err(JcError::SessionEnded);
        }

        self.persist(self.store.delete_session(&self.meta.id))
            .await?;

        self.ended = true;
        self.observers.broadcast(
            &ServerEvent::SessionEnded {
                session_id: self.meta.id.clone(),
                message: SESSION_ENDED_MESSAGE.to_string(),
            },
            None,
        );

        let evicted = self.observers.drain();
        self.bindings.clear();
        self.roster.clear();

        info!(
            target: "jc.actor.room",
            evicted_observers = evicted.len(),
            "Session ended"
        );

        Ok(())
    }

    /// Current roster view.
    fn view(&self) -> RosterView {
        RosterView {
            participants: self.roster.clone(),
            active_song: self.meta.song.clone(),
        }
    }

    /// Run a store call under the configured timeout.
    async fn persist<T, F>(&self, fut: F) -> Result<T, JcError>
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
