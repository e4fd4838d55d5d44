//! Access gate
//!
//! Drives one login attempt through identity verification, the
//! entitlement check, and session creation:
//!
//! ```text
//! Anonymous ─▶ ProviderRedirected ─▶ CallbackReceived
//!                                         │
//!                     ┌───────────────────┴──────────────┐
//!              IdentityRejected                   IdentityVerified
//!                     │                    ┌─────────────┴──────────┐
//!                   Denied         EntitlementFailed        EntitlementPassed
//!                                          │                        │
//!                                        Denied            SessionEstablished
//! ```
//!
//! Both providers follow the same order: the entitlement check always
//! completes before anything is written to the session store.

use std::sync::Arc;

use chrono::Duration;
use url::Url;

use super::entitlement::EntitlementChecker;
use super::identity::IdentityVerifier;
use super::provider::Provider;
use super::session::{Session, SessionStore};
use crate::AppState;
use crate::config::AppConfig;
use crate::error::{AppError, AuthFailure};
use crate::metrics::{LOGIN_ATTEMPTS_TOTAL, SESSIONS_ESTABLISHED_TOTAL};

/// Stage reached by a login attempt, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    ProviderRedirected,
    CallbackReceived,
    IdentityVerified,
    IdentityRejected,
    EntitlementPassed,
    EntitlementFailed,
    SessionEstablished,
    Denied,
}

impl AuthStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthStage::ProviderRedirected => "provider_redirected",
            AuthStage::CallbackReceived => "callback_received",
            AuthStage::IdentityVerified => "identity_verified",
            AuthStage::IdentityRejected => "identity_rejected",
            AuthStage::EntitlementPassed => "entitlement_passed",
            AuthStage::EntitlementFailed => "entitlement_failed",
            AuthStage::SessionEstablished => "session_established",
            AuthStage::Denied => "denied",
        }
    }
}

impl std::fmt::Display for AuthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grant/deny orchestration for one request
pub struct AccessGate<'a> {
    config: &'a AppConfig,
    http_client: &'a reqwest::Client,
    sessions: &'a dyn SessionStore,
}

impl<'a> AccessGate<'a> {
    pub fn new(
        config: &'a AppConfig,
        http_client: &'a reqwest::Client,
        sessions: &'a dyn SessionStore,
    ) -> Self {
        Self {
            config,
            http_client,
            sessions,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(&state.config, &state.http_client, state.sessions.as_ref())
    }

    /// Consent screen URL for `provider`
    pub fn authorization_url(&self, provider: Provider, csrf_state: &str) -> Result<Url, AppError> {
        let url = provider.authorization_url(self.config, csrf_state)?;
        tracing::debug!(
            provider = %provider,
            stage = %AuthStage::ProviderRedirected,
            "Redirecting to provider consent screen"
        );
        Ok(url)
    }

    /// Complete a login from an authorization code
    ///
    /// # Steps
    /// 1. Verify the code with the provider (identity)
    /// 2. Check the provider relationship (entitlement)
    /// 3. Persist the session
    ///
    /// # Errors
    /// Any `AuthFailure`; no session exists when an error is returned
    pub async fn complete(
        &self,
        provider: Provider,
        code: &str,
    ) -> Result<Arc<Session>, AuthFailure> {
        tracing::debug!(provider = %provider, stage = %AuthStage::CallbackReceived, "Callback received");

        let result = self.run(provider, code).await;

        let outcome = match &result {
            Ok(_) => "granted",
            Err(failure) => failure.kind(),
        };
        LOGIN_ATTEMPTS_TOTAL
            .with_label_values(&[provider.as_str(), outcome])
            .inc();

        result
    }

    async fn run(&self, provider: Provider, code: &str) -> Result<Arc<Session>, AuthFailure> {
        let identity = match IdentityVerifier::new(self.config, self.http_client)
            .verify(provider, code)
            .await
        {
            Ok(identity) => identity,
            Err(failure) => {
                tracing::warn!(
                    provider = %provider,
                    stage = %AuthStage::IdentityRejected,
                    error = %failure,
                    "Identity verification failed"
                );
                return Err(failure);
            }
        };

        let profile_id = identity.profile.id.clone();
        tracing::debug!(
            provider = %provider,
            profile_id = %profile_id,
            stage = %AuthStage::IdentityVerified,
            "Identity verified"
        );

        let entitled = EntitlementChecker::new(self.config, self.http_client)
            .check(provider, &identity.access_token)
            .await;
        if !entitled {
            tracing::info!(
                provider = %provider,
                profile_id = %profile_id,
                stage = %AuthStage::EntitlementFailed,
                "Access denied: entitlement not satisfied"
            );
            return Err(AuthFailure::EntitlementDenied);
        }
        tracing::debug!(
            provider = %provider,
            profile_id = %profile_id,
            stage = %AuthStage::EntitlementPassed,
            "Entitlement verified"
        );

        let session = Session::new(identity, Duration::seconds(self.config.session.max_age));
        let session = self.sessions.persist(session).map_err(|error| {
            tracing::error!(
                provider = %provider,
                profile_id = %profile_id,
                %error,
                "Failed to persist session"
            );
            AuthFailure::LoginCommitFailure(error.to_string())
        })?;

        SESSIONS_ESTABLISHED_TOTAL
            .with_label_values(&[provider.as_str()])
            .inc();
        tracing::info!(
            provider = %provider,
            profile_id = %profile_id,
            stage = %AuthStage::SessionEstablished,
            "Session established"
        );

        Ok(session)
    }
}
