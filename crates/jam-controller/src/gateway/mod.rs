//! Connection gateway: the WebSocket surface.
//!
//! Each accepted connection gets a fresh [`ObserverHandle`]; the gateway
//! owns the receiving side and pumps events onto the wire as JSON text
//! frames. The connection is registered for global broadcasts immediately
//! and holds at most one room binding (session id + user) at a time.
//!
//! Inbound frames are fire-and-forget from the client's point of view:
//! failures come back as an `error` event on the same connection, never as
//! a closed socket.

pub mod protocol;

use crate::actors::{ObserverHandle, RoomHandle};
use crate::errors::JcError;
use crate::routes::AppState;
use protocol::{ClientFrame, ServerEvent};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

/// The room this connection has joined, if any.
struct Binding {
    session_id: String,
    room: RoomHandle,
}

/// `GET /ws` upgrade handler.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one WebSocket connection to completion.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (observer, mut events) = ObserverHandle::channel();
    let observer_id = observer.id();

    info!(
        target: "jc.gateway",
        observer_id = %observer_id,
        "Connection established"
    );
    metrics::gauge!("jc_connections").increment(1.0);

    if let Err(err) = state.registry.register_global(observer.clone()).await {
        warn!(
            target: "jc.gateway",
            observer_id = %observer_id,
            error = %err,
            "Failed to register connection, closing"
        );
        metrics::gauge!("jc_connections").decrement(1.0);
        return;
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Outbound pump: events from actors to the wire.
    let pump = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut binding: Option<Binding> = None;

    while let Some(frame) = ws_receiver.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                debug!(
                    target: "jc.gateway",
                    observer_id = %observer_id,
                    error = %err,
                    "Connection error, closing"
                );
                break;
            }
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => handle_frame(frame, &state, &observer, &mut binding).await,
                Err(err) => {
                    debug!(
                        target: "jc.gateway",
                        observer_id = %observer_id,
                        error = %err,
                        "Unparseable frame"
                    );
                    observer.emit(ServerEvent::Error {
                        message: "Unrecognized message".to_string(),
                    });
                }
            },
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    // Disconnect-derived departure: the room decides whether presence goes
    // (last connection for the user) or stays (another tab lives on).
    if let Some(binding) = binding.take() {
        if let Err(err) = binding.room.disconnect(observer_id).await {
            debug!(
                target: "jc.gateway",
                observer_id = %observer_id,
                session_id = %binding.session_id,
                error = %err,
                "Disconnect notification failed"
            );
        }
    }
    if let Err(err) = state.registry.unregister_global(observer_id).await {
        debug!(
            target: "jc.gateway",
            observer_id = %observer_id,
            error = %err,
            "Global unregister failed"
        );
    }

    drop(observer);
    pump.abort();
    metrics::gauge!("jc_connections").decrement(1.0);
    info!(
        target: "jc.gateway",
        observer_id = %observer_id,
        "Connection closed"
    );
}

/// Handle one parsed client frame.
async fn handle_frame(
    frame: ClientFrame,
    state: &AppState,
    observer: &ObserverHandle,
    binding: &mut Option<Binding>,
) {
    match frame {
        ClientFrame::JoinSession { session_id, user } => {
            // Rebinding to a different session behaves like a disconnect
            // from the old one.
            if binding.as_ref().is_some_and(|b| b.session_id != session_id) {
                if let Some(old) = binding.take() {
                    if let Err(err) = old.room.disconnect(observer.id()).await {
                        debug!(
                            target: "jc.gateway",
                            session_id = %old.session_id,
                            error = %err,
                            "Disconnect from previous room failed"
                        );
                    }
                }
            }

            let result = async {
                let room = state.registry.ensure_room(session_id.clone()).await?;
                let view = room.join(user, observer.clone()).await?;
                Ok::<_, JcError>((room, view))
            }
            .await;

            match result {
                Ok((room, view)) => {
                    *binding = Some(Binding {
                        session_id,
                        room,
                    });
                    // Point-to-point replay of current state; broadcasts
                    // cover everyone else.
                    observer.emit(ServerEvent::SessionState {
                        participants: view.participants,
                        active_song: view.active_song,
                    });
                }
                Err(err) => {
                    info!(
                        target: "jc.gateway",
                        session_id = %session_id,
                        error = %err,
                        "Join rejected"
                    );
                    observer.emit(ServerEvent::Error {
                        message: err.client_message(),
                    });
                }
            }
        }

        ClientFrame::LeaveSession { session_id, user } => {
            let result = async {
                let room = state.registry.ensure_room(session_id.clone()).await?;
                room.leave(user.id, Some(observer.id())).await
            }
            .await;

            if binding.as_ref().is_some_and(|b| b.session_id == session_id) {
                *binding = None;
            }

            if let Err(err) = result {
                info!(
                    target: "jc.gateway",
                    session_id = %session_id,
                    error = %err,
                    "Leave rejected"
                );
                observer.emit(ServerEvent::Error {
                    message: err.client_message(),
                });
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::actors::RegistryHandle;
    use crate::config::Config;
    use crate::jc_test_utils::{
        fixtures::{admin, player, session_record},
        MemorySessionStore, TestObserver,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn app_state(store: Arc<MemorySessionStore>) -> AppState {
        AppState {
            registry: RegistryHandle::new(
                Arc::clone(&store) as Arc<dyn crate::store::SessionStore>,
                Duration::from_secs(5),
            ),
            store,
            config: Arc::new(Config::for_tests()),
        }
    }

    #[tokio::test]
    async fn test_join_frame_binds_and_replays_session_state() {
        let record = session_record("jam-ws-1", 4, vec![admin().into()]);
        let store = MemorySessionStore::with_sessions(vec![record]);
        let state = app_state(store);

        let mut connection = TestObserver::new();
        let mut binding = None;

        handle_frame(
            ClientFrame::JoinSession {
                session_id: "jam-ws-1".to_string(),
                user: player("alice"),
            },
            &state,
            &connection.observer(),
            &mut binding,
        )
        .await;

        assert!(binding.is_some());
        match connection.recv().await {
            ServerEvent::SessionState { participants, .. } => {
                assert_eq!(participants.len(), 2);
            }
            other => panic!("expected sessionState, got {other:?}"),
        }

        state.registry.cancel();
    }

    #[tokio::test]
    async fn test_join_unknown_session_emits_error_event() {
        let state = app_state(MemorySessionStore::new());

        let mut connection = TestObserver::new();
        let mut binding = None;

        handle_frame(
            ClientFrame::JoinSession {
                session_id: "missing".to_string(),
                user: player("alice"),
            },
            &state,
            &connection.observer(),
            &mut binding,
        )
        .await;

        assert!(binding.is_none());
        match connection.recv().await {
            ServerEvent::Error { message } => {
                assert_eq!(message, "Session not found");
            }
            other => panic!("expected error event, got {other:?}"),
        }

        state.registry.cancel();
    }

    #[tokio::test]
    async fn test_leave_frame_clears_binding() {
        let record = session_record("jam-ws-2", 4, vec![admin().into()]);
        let store = MemorySessionStore::with_sessions(vec![record]);
        let state = app_state(store);

        let connection = TestObserver::new();
        let mut binding = None;

        handle_frame(
            ClientFrame::JoinSession {
                session_id: "jam-ws-2".to_string(),
                user: player("alice"),
            },
            &state,
            &connection.observer(),
            &mut binding,
        )
        .await;
        assert!(binding.is_some());

        handle_frame(
            ClientFrame::LeaveSession {
                session_id: "jam-ws-2".to_string(),
                user: player("alice"),
            },
            &state,
            &connection.observer(),
            &mut binding,
        )
        .await;
        assert!(binding.is_none());

        state.registry.cancel();
    }

    #[tokio::test]
    async fn test_rebind_to_other_session_releases_old_presence() {
        let first = session_record("jam-ws-3", 4, vec![admin().into()]);
        let second = session_record("jam-ws-4", 4, vec![admin().into()]);
        let store = MemorySessionStore::with_sessions(vec![first, second]);
        let state = app_state(Arc::clone(&store));

        let connection = TestObserver::new();
        let mut binding = None;

        handle_frame(
            ClientFrame::JoinSession {
                session_id: "jam-ws-3".to_string(),
                user: player("alice"),
            },
            &state,
            &connection.observer(),
            &mut binding,
        )
        .await;

        handle_frame(
            ClientFrame::JoinSession {
                session_id: "jam-ws-4".to_string(),
                user: player("alice"),
            },
            &state,
            &connection.observer(),
            &mut binding,
        )
        .await;

        assert!(binding
            .as_ref()
            .is_some_and(|b| b.session_id == "jam-ws-4"));

        // Presence in the first session is gone once the room processes
        // the disconnect.
        let room = state
            .registry
            .ensure_room("jam-ws-3".to_string())
            .await
            .unwrap();
        let mut removed = false;
        for _ in 0..100 {
            let view = room.snapshot().await.unwrap();
            if view.participants.iter().all(|p| p.id != "alice") {
                removed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(removed, "old room should drop alice's presence");

        state.registry.cancel();
    }
}
