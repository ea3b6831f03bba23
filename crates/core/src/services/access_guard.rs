//! Access guard for protected views.
//!
//! A guard starts out `Loading` while the identity lookup is in flight and
//! settles on either rendering the view for a user or redirecting to the
//! login page. Once it has redirected it stays put.

use tokio::sync::broadcast::{self, error::RecvError};
use votebox_db::entities::user;

use crate::services::identity::AuthEvent;

/// What the identity layer currently knows about the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySignal {
    /// Lookup still in progress.
    Pending,
    SignedIn(user::Model),
    SignedOut,
}

/// Guard state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Authenticated(user::Model),
    Unauthenticated,
}

/// What the caller should do after feeding the guard a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Show a loading indicator.
    Wait,
    /// Show the protected content for this user.
    Render(user::Model),
    /// Leave for the given path.
    Redirect(String),
    /// Nothing changed.
    Unchanged,
}

/// Access guard state machine.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    state: GuardState,
    login_path: String,
    waiting: bool,
}

impl AccessGuard {
    /// Create a guard in the `Loading` state.
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            state: GuardState::Loading,
            login_path: login_path.into(),
            waiting: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &GuardState {
        &self.state
    }

    /// The authenticated user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&user::Model> {
        match &self.state {
            GuardState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Feed the guard the latest identity signal.
    pub fn observe(&mut self, signal: IdentitySignal) -> GuardDecision {
        if self.state == GuardState::Unauthenticated {
            return GuardDecision::Unchanged;
        }

        match signal {
            IdentitySignal::Pending => {
                if self.state == GuardState::Loading && !self.waiting {
                    self.waiting = true;
                    GuardDecision::Wait
                } else {
                    GuardDecision::Unchanged
                }
            }
            IdentitySignal::SignedIn(user) => {
                if self.user().is_some_and(|current| current.id == user.id) {
                    return GuardDecision::Unchanged;
                }
                self.state = GuardState::Authenticated(user.clone());
                GuardDecision::Render(user)
            }
            IdentitySignal::SignedOut => {
                self.state = GuardState::Unauthenticated;
                GuardDecision::Redirect(self.login_path.clone())
            }
        }
    }

    /// Settle a guard from a one-shot identity lookup.
    pub fn resolve(&mut self, user: Option<user::Model>) -> GuardDecision {
        self.observe(IdentitySignal::Pending);
        match user {
            Some(user) => self.observe(IdentitySignal::SignedIn(user)),
            None => self.observe(IdentitySignal::SignedOut),
        }
    }

    /// Watch auth events until `user_id`'s session ends.
    ///
    /// Returns the redirect target, or `None` if the event source went away
    /// first.
    pub async fn follow(
        &mut self,
        mut events: broadcast::Receiver<AuthEvent>,
        user_id: &str,
    ) -> Option<String> {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, %user_id, "Access guard lagged behind auth events");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            };

            let AuthEvent::SignedOut { user_id: signed_out } = event else {
                continue;
            };
            if signed_out != user_id {
                continue;
            }

            if let GuardDecision::Redirect(target) = self.observe(IdentitySignal::SignedOut) {
                return Some(target);
            }
        }
    }
}
