//! Session extraction
//!
//! Resolves the signed session cookie to a live [`Session`].

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;

use super::session::{Session, verify_session_cookie};
use crate::AppState;
use crate::config::AppConfig;

/// Verified session id from the request cookies, if any
pub fn session_id_from_jar(jar: &CookieJar, config: &AppConfig) -> Option<String> {
    let cookie = jar.get(&config.session.cookie_name)?;
    match verify_session_cookie(cookie.value(), &config.session.secret) {
        Ok(session_id) => Some(session_id),
        Err(_) => {
            tracing::debug!("Ignoring session cookie with invalid signature");
            None
        }
    }
}

/// Optional session extractor
///
/// Returns None if not authenticated, instead of error.
///
/// # Usage
/// ```ignore
/// async fn handler(MaybeSession(session): MaybeSession) -> impl IntoResponse {
///     match session {
///         Some(session) => format!("Hello, {}", session.identity.profile.greeting_name()),
///         None => "Hello, stranger".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Arc<Session>>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Arc<Session>>().cloned() {
            return Ok(MaybeSession(Some(session)));
        }

        let app_state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let session = session_id_from_jar(&jar, &app_state.config)
            .and_then(|session_id| app_state.sessions.load(&session_id));

        if let Some(session) = &session {
            parts.extensions.insert(session.clone());
        }

        Ok(MaybeSession(session))
    }
}
