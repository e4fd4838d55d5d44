//! OAuth login routes
//!
//! Implements the authorization code flow for every [`Provider`] and hands
//! the callback to the [`AccessGate`].

use axum::{
    Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use time::Duration as TimeDuration;

use super::gate::{AccessGate, AuthStage};
use super::middleware::session_id_from_jar;
use super::provider::Provider;
use super::session::sign_session_id;
use crate::AppState;
use crate::api::pages::render_auth_failure;
use crate::config::AppConfig;
use crate::error::{AppError, AuthFailure};
use crate::metrics::{LOGIN_ATTEMPTS_TOTAL, LOGOUTS_TOTAL};

/// Prefix of the per-provider cookie carrying the CSRF state
pub const STATE_COOKIE_PREFIX: &str = "oauth_state_";

/// Lifetime of the CSRF state cookie
const STATE_COOKIE_MAX_AGE_MINUTES: i64 = 10;

/// Where a successful login lands
pub const PRIVATE_PATH: &str = "/private";

/// Create authentication router
///
/// Routes:
/// - GET /auth/{provider} - Redirect to provider consent screen
/// - GET /auth/{provider}/callback - OAuth callback
/// - POST /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/:provider", get(provider_redirect))
        .route("/auth/:provider/callback", get(provider_callback))
        .route("/logout", post(logout))
}

// =============================================================================
// Provider redirect
// =============================================================================

/// GET /auth/{provider}
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect to the provider with client_id, redirect_uri, scope, state
async fn provider_redirect(
    State(state): State<AppState>,
    Path(provider): Path<Provider>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = generate_csrf_state();
    let url = AccessGate::from_state(&state).authorization_url(provider, &csrf_state)?;

    let cookie = Cookie::build((state_cookie_name(provider), csrf_state))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.should_use_secure_cookies())
        .max_age(TimeDuration::minutes(STATE_COOKIE_MAX_AGE_MINUTES));

    Ok((jar.add(cookie), Redirect::to(url.as_str())))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters of the provider callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code
    pub code: Option<String>,
    /// CSRF state token
    pub state: Option<String>,
    /// Set when the user declined consent
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /auth/{provider}/callback
///
/// Redirects to `/private` once a session exists; every failure renders
/// the error page.
async fn provider_callback(
    State(state): State<AppState>,
    Path(provider): Path<Provider>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    let state_cookie = state_cookie_name(provider);
    let expected_state = jar.get(&state_cookie).map(|c| c.value().to_owned());
    let jar = jar.remove(Cookie::build((state_cookie, "")).path("/"));

    let result = match check_callback(&query, expected_state.as_deref()) {
        Ok(code) => AccessGate::from_state(&state).complete(provider, code).await,
        Err(failure) => {
            tracing::warn!(
                provider = %provider,
                stage = %AuthStage::IdentityRejected,
                error = %failure,
                "Rejected OAuth callback"
            );
            LOGIN_ATTEMPTS_TOTAL
                .with_label_values(&[provider.as_str(), failure.kind()])
                .inc();
            Err(failure)
        }
    };

    let failure = match result {
        Ok(session) => match sign_session_id(&session.id, &state.config.session.secret) {
            Ok(signed) => {
                // Re-login replaces the session this browser already holds
                if let Some(previous) = session_id_from_jar(&jar, &state.config) {
                    state.sessions.remove(&previous);
                    tracing::debug!(provider = %provider, "Replaced previous session");
                }
                let jar = jar.add(session_cookie(&state.config, signed));
                return (jar, Redirect::to(PRIVATE_PATH)).into_response();
            }
            Err(error) => {
                state.sessions.remove(&session.id);
                AuthFailure::LoginCommitFailure(error.to_string())
            }
        },
        Err(failure) => failure,
    };

    tracing::debug!(
        provider = %provider,
        stage = %AuthStage::Denied,
        reason = failure.kind(),
        "Rendering login failure"
    );
    (jar, render_auth_failure(&state.config, provider, &failure)).into_response()
}

/// Validate callback parameters before contacting the provider
///
/// # Returns
/// The authorization code
fn check_callback<'q>(
    query: &'q CallbackQuery,
    expected_state: Option<&str>,
) -> Result<&'q str, AuthFailure> {
    if let Some(error) = &query.error {
        let description = query.error_description.as_deref().unwrap_or_default();
        return Err(AuthFailure::ProviderRejected(format!(
            "provider returned error: {error} {description}"
        )));
    }

    match (expected_state, query.state.as_deref()) {
        (Some(expected), Some(received)) if !expected.is_empty() && expected == received => {}
        _ => {
            return Err(AuthFailure::ProviderRejected(
                "OAuth state missing or mismatched".to_string(),
            ));
        }
    }

    query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AuthFailure::ProviderRejected("missing authorization code".to_string()))
}

/// Name of the CSRF state cookie for `provider`
///
/// A state issued for one provider never validates another provider's callback.
pub fn state_cookie_name(provider: Provider) -> String {
    format!("{STATE_COOKIE_PREFIX}{}", provider.as_str())
}

fn session_cookie(config: &AppConfig, value: String) -> Cookie<'static> {
    Cookie::build((config.session.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.should_use_secure_cookies())
        .build()
}

// =============================================================================
// Logout
// =============================================================================

/// POST /logout
///
/// Drops the session and clears its cookie.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(session_id) = session_id_from_jar(&jar, &state.config) {
        state.sessions.remove(&session_id);
        LOGOUTS_TOTAL.inc();
        tracing::info!("Session ended by logout");
    }

    let jar = jar.remove(Cookie::build((state.config.session.cookie_name.clone(), "")).path("/"));
    (jar, Redirect::to("/"))
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    use base64::{Engine as _, engine::general_purpose};
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
