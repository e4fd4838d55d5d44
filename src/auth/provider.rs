//! Supported identity providers
//!
//! Each provider is a variant of one tagged enum. The variant decides the
//! consent scopes, the OAuth endpoints, and the wording shown to a user
//! who is denied.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::AppConfig;
use crate::error::{AppError, AuthFailure};

/// GitHub scope needed to read the follow relationship
pub const GITHUB_SCOPES: &[&str] = &["user:follow"];

/// Google scopes for the profile email and the subscription listing
pub const GOOGLE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/youtube.readonly",
];

/// OAuth identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    Google,
}

/// Client credentials and endpoints for one provider
#[derive(Debug, Clone, Copy)]
pub struct OAuthClient<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub authorize_url: &'a str,
    pub token_url: &'a str,
}

impl Provider {
    /// Path segment and metric label
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Google => "google",
        }
    }

    /// Human-facing provider name
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::GitHub => "GitHub",
            Provider::Google => "Google",
        }
    }

    pub fn scopes(self) -> &'static [&'static str] {
        match self {
            Provider::GitHub => GITHUB_SCOPES,
            Provider::Google => GOOGLE_SCOPES,
        }
    }

    pub fn client(self, config: &AppConfig) -> OAuthClient<'_> {
        match self {
            Provider::GitHub => OAuthClient {
                client_id: &config.github.client_id,
                client_secret: &config.github.client_secret,
                authorize_url: &config.github.authorize_url,
                token_url: &config.github.token_url,
            },
            Provider::Google => OAuthClient {
                client_id: &config.google.client_id,
                client_secret: &config.google.client_secret,
                authorize_url: &config.google.authorize_url,
                token_url: &config.google.token_url,
            },
        }
    }

    /// Redirect URI registered with the provider
    pub fn callback_url(self, config: &AppConfig) -> String {
        match self {
            Provider::GitHub => config.github_callback_url(),
            Provider::Google => config.google_callback_url(),
        }
    }

    /// Build the consent screen URL
    ///
    /// # Arguments
    /// * `config` - Application configuration
    /// * `state` - CSRF state echoed back on the callback
    pub fn authorization_url(self, config: &AppConfig, state: &str) -> Result<Url, AppError> {
        let client = self.client(config);
        let scope = self.scopes().join(" ");
        let redirect_uri = self.callback_url(config);

        Url::parse_with_params(
            client.authorize_url,
            &[
                ("client_id", client.client_id),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| {
            AppError::Config(format!(
                "invalid {} authorize_url: {e}",
                self.as_str()
            ))
        })
    }

    /// Message shown when the identity lacks the required relationship
    pub fn denial_message(self, config: &AppConfig) -> String {
        match self {
            Provider::GitHub => format!(
                "Please follow {} on GitHub to access this page.",
                config.github.target_account
            ),
            Provider::Google => format!(
                "You must be subscribed to the {} channel.",
                config.google.target_channel_name
            ),
        }
    }

    /// User-facing text for a failed attempt
    ///
    /// Provider diagnostics never appear here.
    pub fn failure_message(self, failure: &AuthFailure, config: &AppConfig) -> String {
        match failure {
            AuthFailure::EntitlementDenied => self.denial_message(config),
            AuthFailure::ProviderRejected(_) | AuthFailure::NetworkFailure(_) => format!(
                "An error occurred during the {} authentication process.",
                self.display_name()
            ),
            AuthFailure::LoginCommitFailure(_) => "Login failed.".to_string(),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
