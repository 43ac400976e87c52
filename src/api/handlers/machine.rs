//! Machine handlers: fleet view, add, toggle pause, remove.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{CommandAcceptedResponse, MachineListResponse};
use crate::app_state::AppState;
use crate::connection::ConnectionHandle;
use crate::domain::{Machine, MachineId};
use crate::error::{ErrorResponse, FleetError};

/// `GET /machines` — Current fleet view.
#[utoipa::path(
    get,
    path = "/api/v1/machines",
    tag = "Machines",
    summary = "List machines",
    description = "Returns the last known state of every machine, ordered by id.",
    responses(
        (status = 200, description = "Fleet snapshot", body = MachineListResponse),
    )
)]
pub async fn list_machines(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.fleet.snapshot();
    let data: Vec<Machine> = snapshot.values().cloned().collect();
    let count = data.len();
    Json(MachineListResponse { data, count })
}

/// `GET /machines/{id}` — One machine.
///
/// # Errors
///
/// Returns [`FleetError::MachineNotFound`] if the machine has not reported.
#[utoipa::path(
    get,
    path = "/api/v1/machines/{id}",
    tag = "Machines",
    summary = "Get machine",
    params(
        ("id" = u32, Path, description = "Machine id"),
    ),
    responses(
        (status = 200, description = "Last known state", body = Machine),
        (status = 404, description = "Machine not found", body = ErrorResponse),
    )
)]
pub async fn get_machine(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, FleetError> {
    let machine_id = MachineId::new(id);
    let machine = state
        .fleet
        .machine(machine_id)
        .ok_or(FleetError::MachineNotFound(machine_id))?;
    Ok(Json(machine))
}

/// `POST /machines` — Open a connection for one more machine.
///
/// The machine appears in the fleet view once its first update arrives.
///
/// # Errors
///
/// Returns [`FleetError::ConnectionLimitReached`] when capped.
#[utoipa::path(
    post,
    path = "/api/v1/machines",
    tag = "Machines",
    summary = "Add machine",
    responses(
        (status = 202, description = "Connection opening", body = ConnectionHandle),
        (status = 429, description = "Connection limit reached", body = ErrorResponse),
    )
)]
pub async fn add_machine(State(state): State<AppState>) -> Result<impl IntoResponse, FleetError> {
    let handle = state.fleet.add_machine().await?;
    Ok((StatusCode::ACCEPTED, Json(handle)))
}

/// `POST /machines/{id}/toggle-pause` — Pause a running machine or resume a
/// paused one.
///
/// # Errors
///
/// Returns [`FleetError::MachineNotFound`] or a delivery failure (409).
#[utoipa::path(
    post,
    path = "/api/v1/machines/{id}/toggle-pause",
    tag = "Machines",
    summary = "Toggle pause",
    description = "Sends the command opposite to the machine's known pause state. The fleet view changes only when the machine confirms.",
    params(
        ("id" = u32, Path, description = "Machine id"),
    ),
    responses(
        (status = 202, description = "Command sent", body = CommandAcceptedResponse),
        (status = 404, description = "Machine not found", body = ErrorResponse),
        (status = 409, description = "No open connection for the machine", body = ErrorResponse),
    )
)]
pub async fn toggle_pause(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, FleetError> {
    let command = state.fleet.toggle_pause(MachineId::new(id)).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CommandAcceptedResponse {
            command,
            status: "sent".to_string(),
        }),
    ))
}

/// `DELETE /machines/{id}` — Always rejected.
///
/// # Errors
///
/// Always returns [`FleetError::NotSupported`].
#[utoipa::path(
    delete,
    path = "/api/v1/machines/{id}",
    tag = "Machines",
    summary = "Remove machine (unsupported)",
    params(
        ("id" = u32, Path, description = "Machine id"),
    ),
    responses(
        (status = 501, description = "Machine removal is not supported", body = ErrorResponse),
    )
)]
pub async fn remove_machine(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<StatusCode, FleetError> {
    state.fleet.remove_machine(MachineId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Machine routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/machines", get(list_machines).post(add_machine))
        .route("/machines/{id}", get(get_machine).delete(remove_machine))
        .route("/machines/{id}/toggle-pause", post(toggle_pause))
}
