// ABOUTME: Login-or-provision reconciliation over the auth backend seam
// ABOUTME: Disambiguates wrong PIN from concurrent provisioning with a single sign-in retry

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::backend::{AccountIdentity, AuthBackend, BackendError, Preferences};
use crate::derive::{account_id_for, derive_credential, derived_email};
use crate::error::{AppError, Result};
use crate::session::SessionStore;

/// Outcome of one PIN submission. Wrong PIN and a busy flow are expected,
/// non-fatal results the UI renders as a retry affordance; fatal failures
/// travel as `AppError`.
#[derive(Debug)]
pub enum AuthOutcome {
    Established(SessionEstablished),
    WrongPin,
    Busy,
}

#[derive(Debug)]
pub struct SessionEstablished {
    pub account_id: String,
    pub display_name: String,
    pub session_token: String,
    pub preferences: Preferences,
}

/// Serializes reconciliation per platform identity. A second submission
/// while one is in flight is rejected, not queued: it could otherwise
/// observe the intermediate state of an in-progress provisioning.
pub struct Reconciler {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

struct FlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.key);
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn try_begin(&self, platform_id: &str) -> Option<FlightGuard> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(platform_id.to_string()) {
            return None;
        }
        Some(FlightGuard {
            set: Arc::clone(&self.in_flight),
            key: platform_id.to_string(),
        })
    }

    /// The three-way decision: sign in, provision, or report a wrong PIN.
    ///
    /// Create is only attempted after a clean `InvalidCredentials`; any
    /// ambiguous failure is fatal without a creation attempt, since creating
    /// after an ambiguous error risks duplicate or partial accounts. An
    /// `AlreadyExists` on create means either the PIN was wrong or a
    /// concurrent request provisioned the account first; one sign-in retry
    /// with the same credential tells the two apart.
    pub async fn authenticate<B: AuthBackend>(
        &self,
        backend: &B,
        sessions: &SessionStore,
        pin: &str,
        platform_id: &str,
        display_name_hint: &str,
    ) -> Result<AuthOutcome> {
        let Some(_guard) = self.try_begin(platform_id) else {
            return Ok(AuthOutcome::Busy);
        };

        let credential = derive_credential(pin, platform_id)?;
        let email = derived_email(platform_id);

        // A stale session must not mask the outcome of this attempt.
        sessions.invalidate_platform(platform_id);

        match backend.sign_in(&email, &credential).await {
            Ok(identity) => {
                let identity = backend
                    .current_identity(&identity.id)
                    .await
                    .map_err(fatal)?;
                if identity.is_placeholder() {
                    // A session without a real identity is a backend
                    // misconfiguration, not a credential mismatch; creating
                    // an account here would be acting on ambiguity.
                    sessions.invalidate_platform(platform_id);
                    return Err(AppError::Backend(
                        "backend produced an anonymous session".to_string(),
                    ));
                }
                Ok(AuthOutcome::Established(
                    self.establish(backend, sessions, identity, platform_id).await,
                ))
            }
            Err(BackendError::InvalidCredentials) => {
                self.provision(backend, sessions, &email, &credential, platform_id, display_name_hint)
                    .await
            }
            Err(err) => Err(fatal(err)),
        }
    }

    async fn provision<B: AuthBackend>(
        &self,
        backend: &B,
        sessions: &SessionStore,
        email: &str,
        credential: &str,
        platform_id: &str,
        display_name_hint: &str,
    ) -> Result<AuthOutcome> {
        let account_id = account_id_for(platform_id);
        let display_name = if display_name_hint.is_empty() {
            "Reader"
        } else {
            display_name_hint
        };

        match backend
            .create_account(&account_id, email, credential, display_name)
            .await
        {
            Ok(_) => {
                // Create-then-login is one step from the caller's view.
                let identity = backend.sign_in(email, credential).await.map_err(fatal)?;
                Ok(AuthOutcome::Established(
                    self.establish(backend, sessions, identity, platform_id).await,
                ))
            }
            Err(BackendError::AlreadyExists) => {
                // The account exists but our credential just failed. Either
                // the PIN is wrong, or a concurrent request with the right
                // PIN created the account between our sign-in and create.
                // Exactly one retry with the same credential disambiguates.
                match backend.sign_in(email, credential).await {
                    Ok(identity) => Ok(AuthOutcome::Established(
                        self.establish(backend, sessions, identity, platform_id).await,
                    )),
                    Err(BackendError::InvalidCredentials) => Ok(AuthOutcome::WrongPin),
                    Err(err) => Err(fatal(err)),
                }
            }
            Err(err) => Err(fatal(err)),
        }
    }

    async fn establish<B: AuthBackend>(
        &self,
        backend: &B,
        sessions: &SessionStore,
        identity: AccountIdentity,
        platform_id: &str,
    ) -> SessionEstablished {
        // Preference restore is best-effort; its failure never fails the
        // authentication itself.
        let preferences = match backend.get_preferences(&identity.id).await {
            Ok(prefs) => prefs,
            Err(err) => {
                tracing::warn!("preference restore failed for {}: {}", identity.id, err);
                Preferences::default()
            }
        };

        let session_token =
            sessions.create_session(identity.id.clone(), platform_id.to_string());

        SessionEstablished {
            account_id: identity.id,
            display_name: identity.display_name,
            session_token,
            preferences,
        }
    }
}

fn fatal(err: BackendError) -> AppError {
    AppError::Backend(err.to_string())
}
