// ABOUTME: Authentication backend seam with a closed error taxonomy
// ABOUTME: Reconciliation only ever sees these shapes, never raw SDK or database errors

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical identity of a resolved account, as reported by the backend.
#[derive(Debug, Clone)]
pub struct AccountIdentity {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

impl AccountIdentity {
    /// A misconfigured backend can hand out anonymous sessions that look
    /// superficially successful. Those carry no real id or email.
    pub fn is_placeholder(&self) -> bool {
        self.id.is_empty() || self.email.is_empty()
    }
}

/// Per-account preferences restored after a session is established.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub language: Option<String>,
    pub calendar: Option<String>,
}

/// The only failure classes the reconciliation flow may branch on.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Sign-in rejected: unknown account key or credential mismatch.
    /// The two cases are indistinguishable on purpose.
    InvalidCredentials,
    /// Account creation hit the uniqueness constraint on the account id.
    AlreadyExists,
    /// Anything ambiguous: network fault, rate limit, server error.
    Unavailable(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::InvalidCredentials => write!(f, "invalid credentials"),
            BackendError::AlreadyExists => write!(f, "account already exists"),
            BackendError::Unavailable(msg) => write!(f, "backend unavailable: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Attempt sign-in with the derived email key and credential.
    async fn sign_in(&self, email: &str, credential: &str)
        -> Result<AccountIdentity, BackendError>;

    /// Provision an account under a stable id. Must fail with
    /// `AlreadyExists` when the id or email is already taken.
    async fn create_account(
        &self,
        account_id: &str,
        email: &str,
        credential: &str,
        display_name: &str,
    ) -> Result<AccountIdentity, BackendError>;

    /// Canonical identity for an established session's account.
    async fn current_identity(&self, account_id: &str) -> Result<AccountIdentity, BackendError>;

    async fn get_preferences(&self, account_id: &str) -> Result<Preferences, BackendError>;

    async fn set_preferences(
        &self,
        account_id: &str,
        prefs: &Preferences,
    ) -> Result<(), BackendError>;
}
