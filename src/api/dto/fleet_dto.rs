//! Response bodies for the fleet endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use crate::connection::ConnectionSummary;
use crate::domain::{Command, Machine};

/// Response body for `GET /machines`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MachineListResponse {
    /// Last known state of every machine, ordered by id.
    pub data: Vec<Machine>,
    /// Number of machines.
    pub count: usize,
}

/// Response body for `POST /machines/{id}/toggle-pause`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommandAcceptedResponse {
    /// Command written to the machine's connection.
    pub command: Command,
    /// Always `"sent"`; the fleet view changes once the machine confirms.
    pub status: String,
}

/// Response body for `GET /connections`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionListResponse {
    /// Every tracked connection, oldest first.
    pub data: Vec<ConnectionSummary>,
    /// Number of connections.
    pub count: usize,
}

/// Response body for `POST /view/unmount`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UnmountResponse {
    /// Number of mount-scoped connections asked to close.
    pub closed: usize,
}
