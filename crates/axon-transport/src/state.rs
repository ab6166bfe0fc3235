//! Connection state machine.
//!
//! ```text
//! Disconnected ──attempt──▶ Connecting ──opened──▶ Connected
//!      ▲                        │                      │
//!      └────────closed──────────┴──────────closed──────┘
//!   any ──failed──▶ Error ──attempt──▶ Connecting
//! ```

use axon_schema::ConnectionState;

/// Transport-level occurrences that move the connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Attempt,
    Opened,
    Closed,
    Failed,
}

/// Next state for `signal`, or `None` when the transition is not allowed.
pub fn next_state(current: ConnectionState, signal: Signal) -> Option<ConnectionState> {
    use ConnectionState::*;
    match (current, signal) {
        (Disconnected | Error, Signal::Attempt) => Some(Connecting),
        (Connecting, Signal::Opened) => Some(Connected),
        (Connecting | Connected, Signal::Closed) => Some(Disconnected),
        (_, Signal::Failed) => Some(Error),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn happy_path() {
        let s = next_state(Disconnected, Signal::Attempt).unwrap();
        assert_eq!(s, Connecting);
        let s = next_state(s, Signal::Opened).unwrap();
        assert_eq!(s, Connected);
        let s = next_state(s, Signal::Closed).unwrap();
        assert_eq!(s, Disconnected);
    }

    #[test]
    fn failure_from_any_state() {
        for state in [Disconnected, Connecting, Connected, Error] {
            assert_eq!(next_state(state, Signal::Failed), Some(Error));
        }
    }

    #[test]
    fn error_is_recoverable() {
        assert_eq!(next_state(Error, Signal::Attempt), Some(Connecting));
    }

    #[test]
    fn invalid_transitions_rejected() {
        assert_eq!(next_state(Disconnected, Signal::Opened), None);
        assert_eq!(next_state(Connected, Signal::Attempt), None);
        assert_eq!(next_state(Connecting, Signal::Attempt), None);
        assert_eq!(next_state(Error, Signal::Closed), None);
        assert_eq!(next_state(Disconnected, Signal::Closed), None);
    }
}
