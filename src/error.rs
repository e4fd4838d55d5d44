//! Error types for Followgate
//!
//! `AppError` covers startup and plumbing failures and implements
//! `IntoResponse`. `AuthFailure` is the access gate's taxonomy; it never
//! escapes the gate and is always rendered as an error page.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption/signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Maps each variant to a status code and a JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "http_client"),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Encryption(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "encryption",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Why an authentication attempt did not produce a session
///
/// The `String` payloads carry diagnostic detail for the server log only.
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// Bad, expired or revoked code, denied consent, or a state mismatch
    #[error("provider rejected the credential: {0}")]
    ProviderRejected(String),

    /// Provider unreachable, timed out, or returned an undecodable body
    #[error("provider unreachable: {0}")]
    NetworkFailure(String),

    /// Identity verified but the required relationship is missing
    #[error("entitlement check failed")]
    EntitlementDenied,

    /// The session could not be written
    #[error("session could not be established: {0}")]
    LoginCommitFailure(String),
}

impl AuthFailure {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AuthFailure::ProviderRejected(_) => "provider_rejected",
            AuthFailure::NetworkFailure(_) => "network_failure",
            AuthFailure::EntitlementDenied => "entitlement_denied",
            AuthFailure::LoginCommitFailure(_) => "login_commit_failure",
        }
    }

    /// Status code of the rendered error page
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthFailure::ProviderRejected(_) => StatusCode::UNAUTHORIZED,
            AuthFailure::NetworkFailure(_) => StatusCode::BAD_GATEWAY,
            AuthFailure::EntitlementDenied => StatusCode::OK,
            AuthFailure::LoginCommitFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for AuthFailure {
    fn from(err: reqwest::Error) -> Self {
        AuthFailure::NetworkFailure(err.to_string())
    }
}
