//! Fleet error types with HTTP status code mapping.
//!
//! [`FleetError`] is the central error type for the crate. None of its
//! variants is fatal to the process: the worst outcome is a stale or inert
//! machine entry. Each variant maps to a numeric code and an HTTP status so
//! the presentation bridge can surface it to the operator.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::connection::{ConnectionState, Signal};
use crate::domain::{ConnectionId, MachineId};

/// Structured JSON error response body.
///
/// ```json
/// { "error": { "code": 2002, "message": "no connection bound to machine 7" } }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error enum for the fleet core and its bridge.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status                    |
/// |-----------|---------------------|--------------------------------|
/// | 1000–1999 | Decode              | 400 Bad Request                |
/// | 2000–2999 | Lookup / delivery   | 404 Not Found / 409 Conflict   |
/// | 3000–3999 | Internal / service  | 500 / 503                      |
/// | 4000–4999 | Policy              | 429 / 501                      |
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// Inbound frame is not a well-formed machine record.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    /// No machine with this id has reported yet.
    #[error("machine not found: {0}")]
    MachineNotFound(MachineId),

    /// No connection is bound to the target machine.
    #[error("no connection bound to machine {0}")]
    NoConnection(MachineId),

    /// The bound connection exists but cannot carry commands.
    #[error("connection for machine {machine_id} is {state}, not open")]
    ConnectionNotOpen {
        /// Target machine.
        machine_id: MachineId,
        /// Current connection state.
        state: ConnectionState,
    },

    /// The transport refused the outbound frame.
    #[error("delivery to machine {machine_id} failed: {reason}")]
    DeliveryFailed {
        /// Target machine.
        machine_id: MachineId,
        /// Transport reason.
        reason: String,
    },

    /// No connection with this id exists in the registry.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// A lifecycle signal does not apply to the connection's current state.
    #[error("invalid transition: {signal} while {from}")]
    InvalidTransition {
        /// State the connection was in.
        from: ConnectionState,
        /// Signal that was rejected.
        signal: Signal,
    },

    /// Opening another connection would exceed the configured cap.
    #[error("connection limit reached ({limit} active)")]
    ConnectionLimitReached {
        /// Configured maximum.
        limit: usize,
    },

    /// The operation is not supported by the push source.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// The fleet event loop is no longer running.
    #[error("fleet service unavailable")]
    ServiceUnavailable,

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FleetError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MalformedMessage(_) => 1001,
            Self::MachineNotFound(_) => 2001,
            Self::NoConnection(_) => 2002,
            Self::ConnectionNotOpen { .. } => 2003,
            Self::DeliveryFailed { .. } => 2004,
            Self::ConnectionNotFound(_) => 2005,
            Self::Internal(_) => 3000,
            Self::ServiceUnavailable => 3001,
            Self::InvalidTransition { .. } => 3002,
            Self::ConnectionLimitReached { .. } => 4001,
            Self::NotSupported(_) => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedMessage(_) => StatusCode::BAD_REQUEST,
            Self::MachineNotFound(_) | Self::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            Self::NoConnection(_) | Self::ConnectionNotOpen { .. } | Self::DeliveryFailed { .. } => {
                StatusCode::CONFLICT
            }
            Self::Internal(_) | Self::InvalidTransition { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ConnectionLimitReached { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotSupported(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Returns `true` if a command could not reach its machine.
    #[must_use]
    pub const fn is_delivery_failure(&self) -> bool {
        matches!(
            self,
            Self::NoConnection(_) | Self::ConnectionNotOpen { .. } | Self::DeliveryFailed { .. }
        )
    }
}

impl IntoResponse for FleetError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
