//! Server-rendered pages
//!
//! Landing page, private page and the login error view.

use axum::{
    Router,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use html_escape::encode_text;

use crate::AppState;
use crate::auth::{MaybeSession, Provider};
use crate::config::AppConfig;
use crate::error::AuthFailure;

/// Create page router
///
/// Routes:
/// - GET / - Landing page
/// - GET /private - Private content
pub fn pages_router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing_page))
        .route("/private", get(private_page))
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
</head>
<body>
{body}
</body>
</html>
"#,
        title = encode_text(title),
    ))
}

/// GET /
async fn landing_page(MaybeSession(session): MaybeSession) -> Html<String> {
    let status = match session {
        Some(session) => format!(
            r#"<p>Signed in as {}. <a href="/private">Continue to the private page</a></p>"#,
            encode_text(session.identity.profile.greeting_name())
        ),
        None => String::new(),
    };

    layout(
        "Followgate",
        &format!(
            r#"<h1>Followgate</h1>
<p>Sign in to reach the private page.</p>
{status}
<ul>
    <li><a href="/auth/github">Sign in with GitHub</a></li>
    <li><a href="/auth/google">Sign in with Google</a></li>
</ul>"#
        ),
    )
}

/// GET /private
///
/// Without a session the visitor is sent back to `/` unless
/// `access.require_session` is disabled.
async fn private_page(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Response {
    let greeting = match (&session, state.config.access.require_session) {
        (Some(session), _) => format!(
            "<p>Welcome, {} (signed in with {}).</p>",
            encode_text(session.identity.profile.greeting_name()),
            session.identity.provider.display_name()
        ),
        (None, true) => {
            tracing::debug!("Private page requested without a session");
            return Redirect::to("/").into_response();
        }
        (None, false) => String::new(),
    };

    let logout = if session.is_some() {
        r#"<form method="post" action="/logout"><button type="submit">Sign out</button></form>"#
    } else {
        ""
    };

    layout(
        "Private",
        &format!("<h1>Private page</h1>\n{greeting}\n<p>Thanks for following along.</p>\n{logout}"),
    )
    .into_response()
}

/// Render the login error view
pub fn error_page(message: &str) -> Html<String> {
    layout(
        "Access denied",
        &format!(
            r#"<h1>Access denied</h1>
<p class="error">{}</p>
<p><a href="/">Back to the start page</a></p>"#,
            encode_text(message)
        ),
    )
}

/// Render an access gate failure for the user
pub fn render_auth_failure(config: &AppConfig, provider: Provider, failure: &AuthFailure) -> Response {
    let message = provider.failure_message(failure, config);
    (failure.status_code(), error_page(&message)).into_response()
}
