//! Registry of live terminal sessions, one per key.
//!
//! The agent run has a single dedicated session; per-tab terminals are keyed
//! by tab id. Attaching under a key that is already live tears the old
//! session down first. Sessions remove themselves when their socket ends.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::bridge::{TerminalEndpoint, TerminalHandle, spawn_session};
use super::surface::TerminalSurface;
use crate::error::TerminalError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// The terminal following the current agent run.
    AgentRun,
    Tab(String),
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::AgentRun => f.write_str("agent-run"),
            SessionKey::Tab(id) => write!(f, "tab:{id}"),
        }
    }
}

struct Entry {
    id: u64,
    handle: TerminalHandle,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    sessions: HashMap<SessionKey, Entry>,
}

/// Shared handle to the registry. Clones see the same sessions.
#[derive(Clone, Default)]
pub struct TerminalSessions {
    inner: Arc<Mutex<Registry>>,
}

impl TerminalSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach `surface` to the socket at `endpoint` under `key`, replacing any
    /// session already attached there.
    pub fn attach<S: TerminalSurface>(
        &self,
        key: SessionKey,
        endpoint: impl Into<TerminalEndpoint>,
        surface: S,
    ) {
        let mut registry = self.lock();
        if let Some(previous) = registry.sessions.remove(&key) {
            tracing::debug!(%key, "Replacing terminal session");
            previous.handle.detach();
        }

        registry.next_id += 1;
        let id = registry.next_id;

        let weak = Arc::downgrade(&self.inner);
        let exit_key = key.clone();
        let handle = spawn_session(endpoint.into(), surface, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut registry = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // A newer session may already own this key.
            if registry.sessions.get(&exit_key).is_some_and(|e| e.id == id) {
                registry.sessions.remove(&exit_key);
            }
        });

        registry.sessions.insert(key, Entry { id, handle });
    }

    /// Tear down the session under `key`. Returns whether one was attached.
    pub fn detach(&self, key: &SessionKey) -> bool {
        match self.lock().sessions.remove(key) {
            Some(entry) => {
                entry.handle.detach();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, key: &SessionKey) -> bool {
        self.lock()
            .sessions
            .get(key)
            .is_some_and(|e| !e.handle.is_finished())
    }

    pub fn send_input(&self, key: &SessionKey, data: &str) -> Result<(), TerminalError> {
        let registry = self.lock();
        let entry = registry
            .sessions
            .get(key)
            .ok_or_else(|| TerminalError::NotAttached(key.to_string()))?;
        entry.handle.send_input(data)
    }

    pub fn resize(&self, key: &SessionKey, cols: u16, rows: u16) -> Result<(), TerminalError> {
        let registry = self.lock();
        let entry = registry
            .sessions
            .get(key)
            .ok_or_else(|| TerminalError::NotAttached(key.to_string()))?;
        entry.handle.resize(cols, rows)
    }

    /// Detach every session.
    pub fn detach_all(&self) {
        for (_, entry) in self.lock().sessions.drain() {
            entry.handle.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display() {
        assert_eq!(SessionKey::AgentRun.to_string(), "agent-run");
        assert_eq!(SessionKey::Tab("t1".into()).to_string(), "tab:t1");
    }

    #[test]
    fn input_to_missing_session_fails() {
        let sessions = TerminalSessions::new();
        let err = sessions.send_input(&SessionKey::AgentRun, "ls\r").unwrap_err();
        assert!(matches!(err, TerminalError::NotAttached(ref k) if k == "agent-run"));
        assert!(!sessions.detach(&SessionKey::AgentRun));
        assert!(!sessions.is_active(&SessionKey::AgentRun));
    }
}
