//! Auth store — session + authorization folded into one reactive state.
//!
//! DESIGN
//! ======
//! One owner task holds the only writer of `AuthState` (a `watch::Sender`).
//! It listens to the session provider, runs lookups in spawned tasks, and
//! applies their results. Readers clone the `watch::Receiver`.
//!
//! ```text
//!   Init ──session──▶ Resolving ──lookup settles──▶ Ready
//!     │                   ▲                          │
//!     └──no session──▶ ReadyAnonymous ◀──session gone┘
//! ```
//!
//! Every lookup is tagged with a monotonic sequence number. A result whose
//! tag is not the latest is discarded, so a slow lookup for a previous user
//! can never overwrite the state of the current one. Superseded lookups are
//! also aborted.
//!
//! LIFECYCLE
//! =========
//! The provider subscription and the state writer live inside the owner task.
//! `shutdown()` (or dropping the store) ends that task, which releases the
//! subscription and closes the state channel; later session events have no
//! writer to reach.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::resolver::{AuthorizationResolver, Resolution};
use super::session::{SessionProvider, SessionSubscription, SignUpOutcome};
use super::types::{AuthError, Authorization, DeleteMode, Role, Session, SessionUser};

const COMMAND_CAPACITY: usize = 16;
const RESULT_CAPACITY: usize = 16;
const SIGN_IN_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// AUTH STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    /// No session event processed yet.
    Init,
    /// Session present, lookup pending.
    Resolving,
    /// Session present, authorization known.
    Ready,
    /// No session.
    ReadyAnonymous,
}

/// Derived, process-local view of who is signed in and what they may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub phase: AuthPhase,
    pub user: Option<SessionUser>,
    pub loading: bool,
    pub authorized: bool,
    /// `None` until a lookup settles for a present session.
    pub role: Option<Role>,
    pub is_admin: bool,
    pub can_hard_delete: bool,
}

impl AuthState {
    #[must_use]
    pub fn init() -> Self {
        Self {
            phase: AuthPhase::Init,
            user: None,
            loading: true,
            authorized: false,
            role: None,
            is_admin: false,
            can_hard_delete: false,
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self { phase: AuthPhase::ReadyAnonymous, loading: false, ..Self::init() }
    }

    #[must_use]
    pub fn resolving(user: SessionUser) -> Self {
        Self { phase: AuthPhase::Resolving, user: Some(user), ..Self::init() }
    }

    #[must_use]
    pub fn ready(user: SessionUser, authorization: Authorization) -> Self {
        Self {
            phase: AuthPhase::Ready,
            user: Some(user),
            loading: false,
            authorized: authorization.authorized,
            role: Some(authorization.role),
            is_admin: authorization.authorized && authorization.role == Role::Admin,
            can_hard_delete: authorization.authorized && authorization.can_hard_delete,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    #[must_use]
    pub fn delete_mode(&self) -> DeleteMode {
        if self.is_admin || self.can_hard_delete { DeleteMode::Hard } else { DeleteMode::Soft }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::init()
    }
}

// =============================================================================
// AUTH STORE
// =============================================================================

enum Command {
    Refresh(oneshot::Sender<()>),
    Shutdown,
}

/// Handle to the owner task. Construct once and pass it down; there is no
/// global instance.
pub struct AuthStore {
    state: watch::Receiver<AuthState>,
    commands: mpsc::Sender<Command>,
    sessions: Arc<dyn SessionProvider>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AuthStore {
    /// Subscribe to `sessions` and spawn the owner task. Must be called
    /// inside a tokio runtime.
    #[must_use]
    pub fn start(sessions: Arc<dyn SessionProvider>, resolver: AuthorizationResolver) -> Self {
        let subscription = sessions.subscribe();
        let (state_tx, state_rx) = watch::channel(AuthState::init());
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (result_tx, result_rx) = mpsc::channel(RESULT_CAPACITY);

        let worker = Worker { resolver, state: state_tx, session: None, seq: 0, in_flight: None, results: result_tx };
        let task = tokio::spawn(worker.run(subscription, cmd_rx, result_rx));

        Self { state: state_rx, commands: cmd_tx, sessions, task: Mutex::new(Some(task)) }
    }

    /// Snapshot of the current state (may be loading).
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every published state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionProvider> {
        &self.sessions
    }

    /// Wait until no lookup is pending.
    pub async fn settled(&self) -> AuthState {
        self.wait_until(|s| !s.loading).await
    }

    /// Like [`settled`](Self::settled) but gives up after `limit`, returning
    /// whatever state is current (possibly still loading).
    pub async fn settled_within(&self, limit: Duration) -> AuthState {
        tokio::time::timeout(limit, self.settled())
            .await
            .unwrap_or_else(|_| self.state())
    }

    /// Re-run the lookup for the current session. A no-op without one.
    pub async fn refresh(&self) -> AuthState {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Refresh(ack_tx)).await.is_err() {
            return self.state();
        }
        let _ = ack_rx.await;
        self.settled().await
    }

    /// Sign in through the provider and wait for the new user's state.
    /// A sign-in always runs a fresh lookup, even when the same user was
    /// already signed in.
    ///
    /// # Errors
    ///
    /// Returns the provider's [`AuthError`] when sign-in fails.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthState, AuthError> {
        let session = self.sessions.sign_in_with_password(email, password).await?;
        Ok(self.resolve_signed_in(&session.user.id).await)
    }

    /// Create an account; when the provider signs it in right away, wait for
    /// its settled state like [`sign_in`](Self::sign_in).
    ///
    /// # Errors
    ///
    /// Returns the provider's [`AuthError`] when sign-up fails.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let outcome = self.sessions.sign_up(email, password).await?;
        if outcome.signed_in {
            self.resolve_signed_in(&outcome.user.id).await;
        }
        Ok(outcome)
    }

    /// Sign out and wait for the anonymous state.
    ///
    /// # Errors
    ///
    /// Returns the provider's remote failure; the local session is gone
    /// either way.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.sessions.sign_out().await;
        let _ = tokio::time::timeout(SIGN_IN_SETTLE_TIMEOUT, self.wait_until(|s| s.user.is_none())).await;
        result
    }

    /// Stop the owner task and release the provider subscription.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("auth store stopped");
    }

    // Session events for an unchanged user id are treated as renewals, so a
    // fresh sign-in asks for the lookup explicitly.
    async fn resolve_signed_in(&self, user_id: &str) -> AuthState {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Refresh(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        let wait = self.wait_until(|s| !s.loading && s.user_id() == Some(user_id));
        tokio::time::timeout(SIGN_IN_SETTLE_TIMEOUT, wait)
            .await
            .unwrap_or_else(|_| self.state())
    }

    async fn wait_until(&self, done: impl FnMut(&AuthState) -> bool) -> AuthState {
        let mut rx = self.state.clone();
        let settled = rx.wait_for(done).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| rx.borrow().clone())
    }
}

impl Drop for AuthStore {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().ok().and_then(Option::take) {
            task.abort();
        }
    }
}

// =============================================================================
// OWNER TASK
// =============================================================================

struct Settled {
    seq: u64,
    user_id: String,
    resolution: Resolution,
}

struct Worker {
    resolver: AuthorizationResolver,
    state: watch::Sender<AuthState>,
    session: Option<Session>,
    seq: u64,
    in_flight: Option<JoinHandle<()>>,
    results: mpsc::Sender<Settled>,
}

impl Worker {
    async fn run(
        mut self,
        mut subscription: SessionSubscription,
        mut commands: mpsc::Receiver<Command>,
        mut results: mpsc::Receiver<Settled>,
    ) {
        let initial = subscription.current();
        self.apply_session(initial);

        loop {
            tokio::select! {
                change = subscription.next_change() => match change {
                    Ok(session) => self.apply_session(session),
                    Err(e) => {
                        info!(error = %e, "session provider gone; auth store stopping");
                        break;
                    }
                },
                cmd = commands.recv() => match cmd {
                    Some(Command::Refresh(ack)) => {
                        self.refresh();
                        let _ = ack.send(());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(done) = results.recv() => self.settle(done),
            }
        }

        self.cancel_in_flight();
    }

    fn apply_session(&mut self, session: Option<Session>) {
        let Some(session) = session else {
            self.cancel_in_flight();
            self.seq += 1;
            if let Some(previous) = self.session.take() {
                info!(user_id = %previous.user.id, "session ended");
            }
            self.state.send_replace(AuthState::anonymous());
            return;
        };

        let same_user = self
            .session
            .as_ref()
            .is_some_and(|current| current.user.id == session.user.id);
        let user = session.user.clone();
        self.session = Some(session);

        if same_user {
            // Token refresh: identity unchanged, authorization stays valid.
            self.state.send_if_modified(|s| {
                if s.user.as_ref() == Some(&user) {
                    return false;
                }
                s.user = Some(user.clone());
                true
            });
            debug!(user_id = %user.id, "session renewed; keeping authorization");
            return;
        }

        info!(user_id = %user.id, "session started; resolving authorization");
        self.begin_resolution(user);
    }

    fn refresh(&mut self) {
        match &self.session {
            Some(session) => {
                let user = session.user.clone();
                debug!(user_id = %user.id, "manual authorization refresh");
                self.begin_resolution(user);
            }
            None => debug!("refresh ignored: no session"),
        }
    }

    fn begin_resolution(&mut self, user: SessionUser) {
        self.cancel_in_flight();
        self.seq += 1;
        let seq = self.seq;
        let user_id = user.id.clone();
        self.state.send_replace(AuthState::resolving(user));

        let resolver = self.resolver.clone();
        let results = self.results.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let resolution = resolver.resolve(&user_id).await;
            let _ = results.send(Settled { seq, user_id, resolution }).await;
        }));
    }

    fn settle(&mut self, done: Settled) {
        if done.seq != self.seq {
            debug!(user_id = %done.user_id, seq = done.seq, latest = self.seq, "discarding stale authorization result");
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        if session.user.id != done.user_id {
            return;
        }
        self.in_flight = None;

        if let Some(err) = &done.resolution.error {
            warn!(user_id = %done.user_id, error = %err, code = err.error_code(), "authorization denied after lookup failure");
        }
        let next = AuthState::ready(session.user.clone(), done.resolution.authorization);
        info!(user_id = %done.user_id, authorized = next.authorized, is_admin = next.is_admin, "authorization settled");
        self.state.send_replace(next);
    }

    fn cancel_in_flight(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
