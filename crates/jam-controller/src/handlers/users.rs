//! User lifecycle handlers.

use crate::errors::JcError;
use crate::routes::AppState;

use axum::extract::{Path, State};
use axum::http::StatusCode;

/// `POST /v1/users/{id}/logout`
///
/// Sweeps the user out of every session they appear in; live rooms
/// broadcast the departure, cold sessions are cleaned directly in the
/// store.
pub async fn logout_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, JcError> {
    state.registry.remove_user_everywhere(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
