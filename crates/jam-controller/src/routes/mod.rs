//! HTTP router and shared application state.

use crate::actors::RegistryHandle;
use crate::config::Config;
use crate::gateway;
use crate::handlers::{sessions, users};
use crate::store::SessionStore;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared state for HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry actor handle; all writes go through it or a room handle.
    pub registry: RegistryHandle,
    /// Direct store access for read endpoints.
    pub store: Arc<dyn SessionStore>,
    pub config: Arc<Config>,
}

/// Build the application router.
pub fn build_routes(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout();

    Router::new()
        .route(
            "/v1/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/v1/sessions/:session_id",
            get(sessions::get_session).delete(sessions::end_session),
        )
        .route("/v1/sessions/:session_id/song", put(sessions::update_song))
        .route("/v1/users/:user_id/logout", post(users::logout_user))
        .route("/ws", get(gateway::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}
