//! Lifecycle state shared by the server and its listener

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;

use crate::error::Result;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl LifecycleState {
    pub fn is_running(self) -> bool {
        self == LifecycleState::Running
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Something the server can start and stop: the HTTP listener in production.
///
/// `start` and `stop` resolve `Ok(false)` when there is nothing to do
/// (already running / not running) and `Ok(true)` when they changed state.
pub trait Endpoint: Send + Sync + 'static {
    fn start(&self) -> impl Future<Output = Result<bool>> + Send;

    fn stop(&self) -> impl Future<Output = Result<bool>> + Send;

    fn is_running(&self) -> bool;

    /// Address actually bound, when running
    fn local_addr(&self) -> Option<SocketAddr>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde() {
        for state in [
            LifecycleState::Stopped,
            LifecycleState::Starting,
            LifecycleState::Running,
            LifecycleState::Stopping,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state));
        }
    }

    #[test]
    fn test_only_running_is_running() {
        assert!(LifecycleState::Running.is_running());
        assert!(!LifecycleState::Starting.is_running());
        assert!(!LifecycleState::Stopping.is_running());
        assert!(!LifecycleState::default().is_running());
    }
}
