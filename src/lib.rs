//! # fleet-monitor
//!
//! Live fleet view and pause/resume control for remote machines that push
//! their state over WebSocket.
//!
//! Every machine reports through its own push connection. Inbound frames are
//! decoded into [`domain::Machine`] records and folded into a single
//! [`domain::FleetStore`]; operator commands travel back on the connection
//! bound to the target machine.
//!
//! ## Architecture
//!
//! ```text
//! Observers (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── FleetHandle ── intents ──┐
//!     │                            ▼
//!     │                  FleetService event loop (service/)
//!     │                    ├── FleetStore (domain/)
//!     │                    └── ConnectionRegistry (connection/)
//!     │                            │
//!     ├── EventBus (domain/) ◄─────┤
//!     │                            ▼
//!     └──────────────────  Transport (WsTransport) ── push source
//! ```
//!
//! All store and registry mutations happen on the event loop task, so no
//! locks guard fleet state.

pub mod api;
pub mod app_state;
pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
