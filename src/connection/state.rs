//! Per-connection lifecycle state machine.
//!
//! ```text
//! connecting --open--> open --message--> open
//!     |                 |
//!     |---close-------->|---close--> closed
//!     |                 |
//!     |---error---------+---error--> errored
//!     |                 |
//!     +--local close----+--local close--> closing --close--> closed
//! ```
//!
//! `closed` and `errored` are terminal. A transport reports `close` after
//! `error`; an errored connection absorbs it and stays errored.

use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::FleetError;

/// Lifecycle state of one push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport is being established.
    Connecting,
    /// Transport is established; messages flow and commands may be sent.
    Open,
    /// Teardown was requested locally; waiting for the transport to finish.
    Closing,
    /// Transport is gone.
    Closed,
    /// Transport failed; the connection is unusable.
    Errored,
}

/// Input that drives a [`ConnectionState`] transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Transport finished its handshake.
    Open,
    /// Transport delivered a data frame.
    Message,
    /// Transport reported a failure.
    Error,
    /// Transport reported that it is closed.
    Close,
    /// The owner asked for teardown.
    LocalClose,
}

impl ConnectionState {
    /// Returns the state reached by applying `signal`, or `None` if the
    /// signal is not valid in this state.
    #[must_use]
    pub const fn next(self, signal: Signal) -> Option<Self> {
        match (self, signal) {
            (Self::Connecting, Signal::Open) | (Self::Open, Signal::Message) => Some(Self::Open),
            (Self::Closing, Signal::Message) => Some(Self::Closing),
            (Self::Connecting | Self::Open, Signal::Error) => Some(Self::Errored),
            (Self::Connecting | Self::Open | Self::Closing, Signal::Close) => Some(Self::Closed),
            (Self::Errored, Signal::Close) => Some(Self::Errored),
            (Self::Connecting | Self::Open, Signal::LocalClose) => Some(Self::Closing),
            _ => None,
        }
    }

    /// Applies `signal`.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidTransition`] if the signal does not apply
    /// to the current state. The state is left unchanged by the caller.
    pub fn transition(self, signal: Signal) -> Result<Self, FleetError> {
        self.next(signal)
            .ok_or(FleetError::InvalidTransition { from: self, signal })
    }

    /// Returns `true` for states with no way out.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }

    /// Returns `true` if commands may be written.
    #[must_use]
    pub const fn accepts_commands(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns the state name as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Message => "message",
            Self::Error => "error",
            Self::Close => "close",
            Self::LocalClose => "local close",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::{Closed, Closing, Connecting, Errored, Open};
    use super::*;

    #[test]
    fn happy_path() {
        let s = Connecting;
        let s = s.transition(Signal::Open).unwrap_or(Errored);
        assert_eq!(s, Open);
        let s = s.transition(Signal::Message).unwrap_or(Errored);
        assert_eq!(s, Open);
        let s = s.transition(Signal::Close).unwrap_or(Errored);
        assert_eq!(s, Closed);
    }

    #[test]
    fn errors_from_connecting_and_open() {
        assert_eq!(Connecting.next(Signal::Error), Some(Errored));
        assert_eq!(Open.next(Signal::Error), Some(Errored));
        assert_eq!(Closing.next(Signal::Error), None);
        assert_eq!(Closed.next(Signal::Error), None);
    }

    #[test]
    fn terminal_states_have_no_way_out() {
        for signal in [Signal::Open, Signal::Message, Signal::Error, Signal::LocalClose] {
            assert_eq!(Closed.next(signal), None);
            assert_eq!(Errored.next(signal), None);
        }
        assert_eq!(Closed.next(Signal::Close), None);
        assert_eq!(Errored.next(Signal::Close), Some(Errored));
        assert!(Closed.is_terminal());
        assert!(Errored.is_terminal());
    }

    #[test]
    fn local_close_goes_through_closing() {
        assert_eq!(Open.next(Signal::LocalClose), Some(Closing));
        assert_eq!(Connecting.next(Signal::LocalClose), Some(Closing));
        assert_eq!(Closing.next(Signal::LocalClose), None);
        assert_eq!(Closing.next(Signal::Close), Some(Closed));
    }

    #[test]
    fn message_before_open_is_rejected() {
        let result = Connecting.transition(Signal::Message);
        assert!(matches!(
            result,
            Err(FleetError::InvalidTransition {
                from: Connecting,
                signal: Signal::Message
            })
        ));
    }

    #[test]
    fn only_open_accepts_commands() {
        assert!(Open.accepts_commands());
        for s in [Connecting, Closing, Closed, Errored] {
            assert!(!s.accepts_commands());
        }
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Connecting).unwrap_or_default(),
            "\"connecting\""
        );
        assert_eq!(Errored.to_string(), "errored");
    }
}
