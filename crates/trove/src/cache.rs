//! Registry of live user sessions.
//!
//! The cache hands out reference-counted [`SessionHandle`]s. Every handle for
//! the same user points at the same [`UserSession`]; the session is evicted
//! when the last handle is released. A single lock guards the map and all
//! reference counts, and it is held only for O(1) map operations, never
//! across an `.await`.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use trove_core::UserId;

use crate::session::UserSession;

struct Entry {
    session: Arc<UserSession>,
    refs: usize,
}

#[derive(Default)]
struct Registry {
    sessions: Mutex<HashMap<UserId, Entry>>,
}

impl Registry {
    // Every critical section leaves the map consistent, so a poisoned lock
    // is safe to keep using.
    fn sessions(&self) -> MutexGuard<'_, HashMap<UserId, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self, user: &UserId) -> Arc<UserSession> {
        let mut sessions = self.sessions();

        if let Some(entry) = sessions.get_mut(user) {
            entry.refs += 1;
            return Arc::clone(&entry.session);
        }

        let session = Arc::new(UserSession::new(user.clone()));
        sessions.insert(
            user.clone(),
            Entry {
                session: Arc::clone(&session),
                refs: 1,
            },
        );
        tracing::debug!(user = %user, "session created");
        session
    }

    fn release(&self, session: &Arc<UserSession>) {
        let mut sessions = self.sessions();
        let user = session.user_id();

        let Some(entry) = sessions.get_mut(user) else {
            tracing::warn!(user = %user, "released a session that is not registered");
            return;
        };
        if !Arc::ptr_eq(&entry.session, session) {
            tracing::warn!(user = %user, "released a stale session");
            return;
        }

        entry.refs -= 1;
        if entry.refs == 0 {
            sessions.remove(user);
            tracing::debug!(user = %user, "session evicted");
        }
    }
}

/// Process-wide map from user to their live session.
///
/// Cloning the cache yields another reference to the same registry.
#[derive(Clone, Default)]
pub struct SessionCache {
    registry: Arc<Registry>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the live session for `user`, creating it if there is none.
    pub fn acquire(&self, user: &UserId) -> SessionHandle {
        SessionHandle {
            registry: Arc::clone(&self.registry),
            session: self.registry.acquire(user),
        }
    }

    /// Give a handle back. Equivalent to dropping it.
    pub fn release(&self, handle: SessionHandle) {
        drop(handle);
    }

    /// Number of handles currently held for `user`.
    pub fn ref_count(&self, user: &UserId) -> usize {
        self.registry
            .sessions()
            .get(user)
            .map_or(0, |entry| entry.refs)
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.registry.sessions().contains_key(user)
    }

    /// Number of users with a live session.
    pub fn live_sessions(&self) -> usize {
        self.registry.sessions().len()
    }
}

/// A counted reference to a live [`UserSession`].
///
/// Dereferences to the session. Dropping the handle releases it; cloning it
/// acquires another reference.
pub struct SessionHandle {
    registry: Arc<Registry>,
    session: Arc<UserSession>,
}

impl SessionHandle {
    /// Give the handle back. Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for SessionHandle {
    type Target = UserSession;

    fn deref(&self) -> &UserSession {
        &self.session
    }
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            session: self.registry.acquire(self.session.user_id()),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.registry.release(&self.session);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionHandle")
            .field(self.session.user_id())
            .finish()
    }
}
