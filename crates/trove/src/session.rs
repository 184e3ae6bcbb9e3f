//! Per-user session state and its mutation gate.
//!
//! A [`UserSession`] is shared by every caller currently working on behalf of
//! one user. All mutating operations go through [`UserSession::lock`], which
//! hands out at most one [`SessionGuard`] at a time; the guard is what the
//! ledger and economy operations require, so an operation cannot run outside
//! the gate.

use std::fmt;

use tokio::sync::{Mutex, MutexGuard};
use trove_core::UserId;

/// Flags kept for a user while their session is live.
#[derive(Debug, Default)]
struct SessionState {
    /// The persistent record is known to exist.
    record_ensured: bool,
    /// The last eligibility check found no previous claim.
    pending_first_claim: bool,
}

/// In-memory session of one user.
pub struct UserSession {
    user_id: UserId,
    gate: Mutex<SessionState>,
}

impl UserSession {
    pub(crate) fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            gate: Mutex::new(SessionState::default()),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Wait for exclusive access to this user.
    ///
    /// Operations for other users are never blocked by this lock.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            user_id: &self.user_id,
            state: self.gate.lock().await,
        }
    }

    /// Exclusive access if nobody else holds it right now.
    pub fn try_lock(&self) -> Option<SessionGuard<'_>> {
        self.gate.try_lock().ok().map(|state| SessionGuard {
            user_id: &self.user_id,
            state,
        })
    }
}

impl fmt::Debug for UserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSession")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to one user's session. Released on drop.
pub struct SessionGuard<'a> {
    user_id: &'a UserId,
    state: MutexGuard<'a, SessionState>,
}

impl SessionGuard<'_> {
    pub fn user_id(&self) -> &UserId {
        self.user_id
    }

    pub fn record_ensured(&self) -> bool {
        self.state.record_ensured
    }

    pub(crate) fn mark_record_ensured(&mut self) {
        self.state.record_ensured = true;
    }

    pub fn first_claim_pending(&self) -> bool {
        self.state.pending_first_claim
    }

    pub(crate) fn set_first_claim_pending(&mut self, pending: bool) {
        self.state.pending_first_claim = pending;
    }
}

impl fmt::Debug for SessionGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("user_id", self.user_id)
            .field("record_ensured", &self.state.record_ensured)
            .field("pending_first_claim", &self.state.pending_first_claim)
            .finish()
    }
}
