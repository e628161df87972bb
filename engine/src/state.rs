//! Wallet service lifecycle state.

use serde::Serialize;

/// Wallet operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    /// Accepting deposits, withdrawals and exchanges.
    Running,
    /// Draining in-flight settlements, refusing new submissions.
    ShuttingDown,
    /// All settlements have reached a terminal state.
    Stopped,
}

impl ServiceState {
    /// Check if new operations are accepted.
    pub fn accepts_requests(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    /// Check if the service is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_running_accepts() {
        assert!(ServiceState::Running.accepts_requests());
        assert!(!ServiceState::ShuttingDown.accepts_requests());
        assert!(!ServiceState::Stopped.accepts_requests());
        assert!(ServiceState::Stopped.is_terminal());
    }
}
