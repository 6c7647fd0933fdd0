//! Identity provider collaborator.
//!
//! The admin panel gates every mutation on a signed-in [`Session`]. The
//! [`IdentityProvider`] trait mirrors the hosted email/password provider the
//! storefront was built against, including its error codes, so callers can
//! map failures to the same user-facing messages.
//!
//! [`LocalIdentity`] checks credentials against the `[[admin.accounts]]`
//! table of `carlot.toml`, which stores SHA-256 digests produced by
//! [`hash_password`] (`carlot hash-password`).

use crate::config::AdminAccount;
use crate::store::Subscription;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;

pub const USER_NOT_FOUND: &str = "auth/user-not-found";
pub const WRONG_PASSWORD: &str = "auth/wrong-password";
pub const INVALID_CREDENTIAL: &str = "auth/invalid-credential";
pub const INVALID_EMAIL: &str = "auth/invalid-email";
pub const MISSING_PASSWORD: &str = "auth/missing-password";
pub const INTERNAL_ERROR: &str = "auth/internal-error";

/// A signed-in administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub uid: String,
    pub email: String,
}

/// A provider failure: a machine-readable code and a human message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({code})")]
pub struct AuthError {
    pub code: String,
    pub message: String,
}

impl AuthError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// True for failures that mean "these credentials are wrong".
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self.code.as_str(),
            INVALID_CREDENTIAL | USER_NOT_FOUND | WRONG_PASSWORD
        )
    }

    /// Message for the login form. Credential failures share one generic
    /// message so the form does not reveal which accounts exist.
    pub fn user_message(&self) -> String {
        if self.is_credential_error() {
            "Invalid email or password. Please try again.".to_string()
        } else {
            format!("Login failed: {}", self.message)
        }
    }
}

pub type SessionCallback = Box<dyn Fn(Option<Session>) + Send + Sync>;

pub trait IdentityProvider: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    fn sign_out(&self);

    fn current_session(&self) -> Option<Session>;

    /// Watch the session. The callback runs immediately with the current
    /// session and again on every sign-in or sign-out.
    fn on_session_change(&self, callback: SessionCallback) -> Subscription;
}

/// Hex SHA-256 of `lowercase(email) + ":" + password`.
pub fn hash_password(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !email.contains(' ')
        }
        None => false,
    }
}

type Listeners = Vec<(u64, Arc<dyn Fn(Option<Session>) + Send + Sync>)>;

#[derive(Default)]
struct State {
    session: Option<Session>,
    listeners: Listeners,
    next_listener: u64,
}

/// Email/password provider backed by the accounts in `carlot.toml`.
pub struct LocalIdentity {
    accounts: Vec<AdminAccount>,
    state: Arc<Mutex<State>>,
}

impl LocalIdentity {
    pub fn new(accounts: Vec<AdminAccount>) -> Self {
        Self {
            accounts,
            state: Arc::default(),
        }
    }

    fn internal_error() -> AuthError {
        AuthError::new(INTERNAL_ERROR, "Identity state is unavailable.")
    }

    /// Replace the session and notify listeners with the lock released.
    fn set_session(&self, session: Option<Session>) -> Result<(), AuthError> {
        let listeners: Vec<_> = {
            let mut state = self.state.lock().map_err(|_| Self::internal_error())?;
            state.session = session.clone();
            state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            listener(session.clone());
        }
        Ok(())
    }
}

fn detach_listener(state: &Weak<Mutex<State>>, id: u64) {
    let Some(state) = state.upgrade() else {
        return;
    };
    if let Ok(mut state) = state.lock() {
        state.listeners.retain(|(lid, _)| *lid != id);
    }
}

impl IdentityProvider for LocalIdentity {
    fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim();
        if !is_plausible_email(email) {
            return Err(AuthError::new(
                INVALID_EMAIL,
                "The email address is badly formatted.",
            ));
        }
        if password.is_empty() {
            return Err(AuthError::new(MISSING_PASSWORD, "A password is required."));
        }

        let account = self
            .accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .ok_or_else(|| {
                tracing::debug!(email, "sign-in for unknown account");
                AuthError::new(USER_NOT_FOUND, "There is no user record for this email.")
            })?;

        if !account
            .password_sha256
            .eq_ignore_ascii_case(&hash_password(email, password))
        {
            tracing::debug!(email, "sign-in with wrong password");
            return Err(AuthError::new(WRONG_PASSWORD, "The password is invalid."));
        }

        let email = account.email.to_lowercase();
        let session = Session {
            uid: format!("{:x}", Sha256::digest(email.as_bytes()))[..28].to_string(),
            email,
        };
        self.set_session(Some(session.clone()))?;
        tracing::info!(email = %session.email, "signed in");
        Ok(session)
    }

    fn sign_out(&self) {
        if self.current_session().is_none() {
            return;
        }
        if self.set_session(None).is_ok() {
            tracing::info!("signed out");
        }
    }

    fn current_session(&self) -> Option<Session> {
        self.state.lock().ok().and_then(|s| s.session.clone())
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        let callback: Arc<dyn Fn(Option<Session>) + Send + Sync> = Arc::from(callback);
        let (id, current) = match self.state.lock() {
            Ok(mut state) => {
                let id = state.next_listener;
                state.next_listener += 1;
                state.listeners.push((id, Arc::clone(&callback)));
                (id, state.session.clone())
            }
            Err(_) => {
                callback(None);
                return Subscription::detached();
            }
        };
        callback(current);
        let weak = Arc::downgrade(&self.state);
        Subscription::new(move || detach_listener(&weak, id))
    }
}
