//! Execution scope of the flow an actor belongs to

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How far a stop request reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// Stop the whole flow
    #[default]
    Global,
    /// Stop only the innermost enclosing scope
    Local,
}

/// Cancellation handles of the enclosing flow
///
/// The local token is a child of the global one: stopping globally also stops
/// locally, not the other way round.
#[derive(Debug, Clone)]
pub struct FlowScope {
    global: CancellationToken,
    local: CancellationToken,
    message: Arc<Mutex<Option<String>>>,
}

impl Default for FlowScope {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowScope {
    /// Create a fresh top-level scope
    pub fn new() -> Self {
        let global = CancellationToken::new();
        let local = global.child_token();
        Self {
            global,
            local,
            message: Arc::new(Mutex::new(None)),
        }
    }

    /// Nested scope sharing this scope's global token
    pub fn nested(&self) -> Self {
        Self {
            global: self.global.clone(),
            local: self.local.child_token(),
            message: self.message.clone(),
        }
    }

    /// Stop execution and remember why
    pub fn stop(&self, mode: StopMode, message: impl Into<String>) {
        let message = message.into();
        warn!("Stopping flow ({:?}): {}", mode, message);

        if let Ok(mut stored) = self.message.lock() {
            stored.get_or_insert(message);
        }

        match mode {
            StopMode::Global => self.global.cancel(),
            StopMode::Local => self.local.cancel(),
        }
    }

    /// Whether this scope was stopped, locally or globally
    pub fn is_stopped(&self) -> bool {
        self.local.is_cancelled()
    }

    /// Whether the whole flow was stopped
    pub fn is_globally_stopped(&self) -> bool {
        self.global.is_cancelled()
    }

    /// First stop message recorded
    pub fn stop_message(&self) -> Option<String> {
        self.message.lock().ok().and_then(|m| m.clone())
    }

    /// Token that fires when this scope is stopped
    pub fn token(&self) -> CancellationToken {
        self.local.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_stop_leaves_parent_running() {
        let flow = FlowScope::new();
        let inner = flow.nested();

        inner.stop(StopMode::Local, "inner done");

        assert!(inner.is_stopped());
        assert!(!flow.is_stopped());
        assert!(!flow.is_globally_stopped());
    }

    #[test]
    fn test_global_stop_reaches_nested() {
        let flow = FlowScope::new();
        let inner = flow.nested();

        inner.stop(StopMode::Global, "canceled");

        assert!(flow.is_stopped());
        assert!(inner.is_stopped());
        assert_eq!(flow.stop_message().as_deref(), Some("canceled"));
    }

    #[test]
    fn test_first_message_wins() {
        let flow = FlowScope::new();
        flow.stop(StopMode::Global, "first");
        flow.stop(StopMode::Global, "second");

        assert_eq!(flow.stop_message().as_deref(), Some("first"));
    }
}
