//! Connection handlers: list, close, unmount.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ConnectionListResponse, UnmountResponse};
use crate::app_state::AppState;
use crate::domain::ConnectionId;
use crate::error::{ErrorResponse, FleetError};

/// `GET /connections` — Every tracked push connection.
///
/// # Errors
///
/// Returns [`FleetError::ServiceUnavailable`] if the fleet loop stopped.
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "Connections",
    summary = "List connections",
    responses(
        (status = 200, description = "Connection summaries", body = ConnectionListResponse),
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, FleetError> {
    let data = state.fleet.connections().await?;
    let count = data.len();
    Ok(Json(ConnectionListResponse { data, count }))
}

/// `POST /connections/{id}/close` — Tear down one connection.
///
/// # Errors
///
/// Returns [`FleetError::ConnectionNotFound`] or
/// [`FleetError::InvalidTransition`] if it is already closing or closed.
#[utoipa::path(
    post,
    path = "/api/v1/connections/{id}/close",
    tag = "Connections",
    summary = "Close connection",
    params(
        ("id" = uuid::Uuid, Path, description = "Connection UUID"),
    ),
    responses(
        (status = 202, description = "Close requested"),
        (status = 404, description = "Connection not found", body = ErrorResponse),
    )
)]
pub async fn close_connection(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<StatusCode, FleetError> {
    state
        .fleet
        .close_connection(ConnectionId::from_uuid(id))
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /view/unmount` — Close the connections the view opened at mount.
///
/// Connections added later with `POST /machines` are left open.
///
/// # Errors
///
/// Returns [`FleetError::ServiceUnavailable`] if the fleet loop stopped.
#[utoipa::path(
    post,
    path = "/api/v1/view/unmount",
    tag = "Connections",
    summary = "Unmount view",
    responses(
        (status = 200, description = "Mount connections closing", body = UnmountResponse),
    )
)]
pub async fn unmount(State(state): State<AppState>) -> Result<impl IntoResponse, FleetError> {
    let closed = state.fleet.unmount().await?;
    Ok(Json(UnmountResponse { closed }))
}

/// Connection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/connections", get(list_connections))
        .route("/connections/{id}/close", post(close_connection))
        .route("/view/unmount", post(unmount))
}
