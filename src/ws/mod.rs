//! Presentation WebSocket: live fleet events and operator commands.
//!
//! Observers connect to `/ws`, receive the current fleet view, then
//! subscribe to the machines they want to follow.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
