use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::model::{Session, SessionKey};
use crate::error::{Result, StepwiseError};
use crate::messaging::MessageHandle;

/// What [`SessionRegistry::modify`] does with the session after the closure returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Keep,
    Remove,
}

/// Owns every live session, keyed by [`SessionKey`].
///
/// `SessionRegistry` is responsible for:
/// - Refusing a second session under a live key
/// - Handing out snapshots of live sessions
/// - Running each state transition under one write lock
/// - Removing finished and abandoned sessions
///
/// A single lock guards the whole map; closures passed to [`SessionRegistry::modify`]
/// are synchronous, so no lock is ever held across outbound I/O. Clones share the
/// same map.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionKey, Session>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session` under its own key.
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::DuplicateSession`] if the key already has a live session.
    /// The existing session is left untouched.
    pub async fn register(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.entry(session.key().clone()) {
            Entry::Occupied(existing) => {
                tracing::debug!(
                    "[SessionRegistry] Rejected duplicate session for {}",
                    existing.key()
                );
                Err(StepwiseError::duplicate(existing.key().clone()))
            }
            Entry::Vacant(slot) => {
                tracing::debug!("[SessionRegistry] Registered session {}", session.id());
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Returns a snapshot of the live session for `key`.
    pub async fn lookup(&self, key: &SessionKey) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(key).cloned()
    }

    pub async fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.read().await.contains_key(key)
    }

    /// Removes the session for `key`. Removing an absent key is a no-op.
    pub async fn remove(&self, key: &SessionKey) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(key)
    }

    /// Runs `f` against the live session for `key` under the write lock.
    ///
    /// Returns `None` if there is no session. When `f` answers [`Disposition::Remove`]
    /// the session leaves the registry before the lock is released and is returned by
    /// value.
    pub async fn modify<R, F>(&self, key: &SessionKey, f: F) -> Option<(R, Option<Session>)>
    where
        F: FnOnce(&mut Session) -> (R, Disposition),
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(key)?;
        let (result, disposition) = f(session);
        let removed = match disposition {
            Disposition::Keep => None,
            Disposition::Remove => sessions.remove(key),
        };
        Some((result, removed))
    }

    /// Stores the handle of a prompt sent for `step`, if the session is still there.
    pub async fn record_prompt(&self, key: &SessionKey, step: usize, handle: MessageHandle) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(key)
            .is_some_and(|session| session.record_prompt(step, handle))
    }

    /// Removes and returns every session idle for at least `max_idle`.
    pub async fn remove_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> Vec<Session> {
        let mut sessions = self.sessions.write().await;
        let idle: Vec<SessionKey> = sessions
            .iter()
            .filter(|(_, session)| session.is_idle(now, max_idle))
            .map(|(key, _)| key.clone())
            .collect();

        idle.iter().filter_map(|key| sessions.remove(key)).collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Keys of all live sessions, sorted.
    pub async fn keys(&self) -> Vec<SessionKey> {
        let sessions = self.sessions.read().await;
        let mut keys: Vec<SessionKey> = sessions.keys().cloned().collect();
        keys.sort();
        keys
    }
}
