//! Process-wide authentication state.
//!
//! The state is a three-shape machine driven by [`SessionAction`]s. Login and
//! signup flows dispatch `Begin*` and then `Succeeded` or `Failed`. The
//! identity-provider listener dispatches `ExternalChange` for anything that
//! happens outside the current request, such as a sign-out elsewhere or an
//! expired token.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::User;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated(User),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    BeginLogin,
    BeginSignup,
    Succeeded(User),
    Failed,
    Logout,
    ExternalChange(Option<User>),
}

/// Serialisable projection handed to views.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let user = self.user().cloned();
        SessionSnapshot {
            is_authenticated: user.is_some(),
            is_loading: matches!(self, SessionState::Authenticating),
            user,
        }
    }
}

pub fn reduce(state: &SessionState, action: SessionAction) -> SessionState {
    match action {
        SessionAction::BeginLogin | SessionAction::BeginSignup => SessionState::Authenticating,
        SessionAction::Succeeded(user) => SessionState::Authenticated(user),
        SessionAction::Failed => match state {
            SessionState::Authenticating => SessionState::Anonymous,
            // A listener event may already have settled the session.
            other => other.clone(),
        },
        SessionAction::Logout => SessionState::Anonymous,
        SessionAction::ExternalChange(Some(user)) => SessionState::Authenticated(user),
        SessionAction::ExternalChange(None) => SessionState::Anonymous,
    }
}

/// The single session of this process. Constructed by the application root
/// and shared by reference; there is no global instance.
pub struct SessionStore {
    state: Mutex<SessionState>,
    changes: broadcast::Sender<SessionSnapshot>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(SessionState::Anonymous),
            changes,
        }
    }

    pub fn dispatch(&self, action: SessionAction) -> SessionSnapshot {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            let next = reduce(&state, action);
            *state = next;
            state.snapshot()
        };

        tracing::debug!(
            authenticated = snapshot.is_authenticated,
            loading = snapshot.is_loading,
            "session updated"
        );
        let _ = self.changes.send(snapshot.clone());
        snapshot
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().unwrap().snapshot()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.lock().unwrap().user().cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.changes.subscribe()
    }
}
