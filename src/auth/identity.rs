//! Identity verification
//!
//! Exchanges an OAuth authorization code for an access token and looks up
//! the provider profile behind it.

use std::time::Instant;

use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::provider::Provider;
use crate::config::AppConfig;
use crate::error::AuthFailure;
use crate::metrics::observe_provider_call;

/// Normalised provider profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Stable provider user id (GitHub numeric id, Google `sub`)
    pub id: String,
    /// GitHub login
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl Profile {
    /// Best name to greet the user with
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Result of a successful code exchange
///
/// The access token is wrapped so it is redacted from `Debug` output.
#[derive(Debug)]
pub struct AuthenticatedIdentity {
    pub provider: Provider,
    pub profile: Profile,
    pub access_token: SecretString,
}

/// Token endpoint response
///
/// GitHub answers a bad code with `200 OK` and an `error` field, so both
/// shapes are read from the same body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GitHub `GET /user`
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// Google OpenID userinfo
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}

/// Performs the OAuth code exchange for a provider
pub struct IdentityVerifier<'a> {
    config: &'a AppConfig,
    http_client: &'a reqwest::Client,
}

impl<'a> IdentityVerifier<'a> {
    pub fn new(config: &'a AppConfig, http_client: &'a reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Verify an authorization code
    ///
    /// # Steps
    /// 1. Exchange the code at the provider token endpoint
    /// 2. Fetch the profile with the issued token
    ///
    /// # Errors
    /// `ProviderRejected` for a refused code or profile lookup,
    /// `NetworkFailure` when the provider cannot be reached or answers
    /// with an undecodable body
    pub async fn verify(
        &self,
        provider: Provider,
        code: &str,
    ) -> Result<AuthenticatedIdentity, AuthFailure> {
        let access_token = self.exchange_code(provider, code).await?;
        let profile = self.fetch_profile(provider, &access_token).await?;

        Ok(AuthenticatedIdentity {
            provider,
            profile,
            access_token,
        })
    }

    async fn exchange_code(
        &self,
        provider: Provider,
        code: &str,
    ) -> Result<SecretString, AuthFailure> {
        let started = Instant::now();
        let result = self.request_token(provider, code).await;

        observe_provider_call(
            provider.as_str(),
            "token",
            outcome_label(&result),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn request_token(
        &self,
        provider: Provider,
        code: &str,
    ) -> Result<SecretString, AuthFailure> {
        let client = provider.client(self.config);
        let redirect_uri = provider.callback_url(self.config);

        let response = self
            .http_client
            .post(client.token_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", client.client_id),
                ("client_secret", client.client_secret),
                ("redirect_uri", redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: TokenResponse = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(AuthFailure::ProviderRejected(format!(
                    "token endpoint returned {status}"
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(error) = body.error {
            let description = body.error_description.unwrap_or_default();
            return Err(AuthFailure::ProviderRejected(format!(
                "token endpoint returned {status}: {error} {description}"
            )));
        }
        if !status.is_success() {
            return Err(AuthFailure::ProviderRejected(format!(
                "token endpoint returned {status}"
            )));
        }

        body.access_token
            .filter(|token| !token.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| {
                AuthFailure::ProviderRejected("token response had no access_token".to_string())
            })
    }

    async fn fetch_profile(
        &self,
        provider: Provider,
        access_token: &SecretString,
    ) -> Result<Profile, AuthFailure> {
        let started = Instant::now();
        let result = self.request_profile(provider, access_token).await;

        observe_provider_call(
            provider.as_str(),
            "profile",
            outcome_label(&result),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn request_profile(
        &self,
        provider: Provider,
        access_token: &SecretString,
    ) -> Result<Profile, AuthFailure> {
        let url = match provider {
            Provider::GitHub => format!("{}/user", self.config.github.api_url.trim_end_matches('/')),
            Provider::Google => self.config.google.userinfo_url.clone(),
        };

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token.expose_secret())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthFailure::ProviderRejected(format!(
                "profile endpoint returned {status}"
            )));
        }

        let profile = match provider {
            Provider::GitHub => {
                let user: GitHubUser = response.json().await?;
                Profile {
                    id: user.id.to_string(),
                    username: Some(user.login),
                    display_name: user.name,
                    email: user.email,
                    avatar_url: user.avatar_url,
                }
            }
            Provider::Google => {
                let info: GoogleUserInfo = response.json().await?;
                Profile {
                    id: info.sub,
                    username: None,
                    display_name: info.name,
                    email: info.email,
                    avatar_url: info.picture,
                }
            }
        };

        Ok(profile)
    }
}

pub(crate) fn outcome_label<T>(result: &Result<T, AuthFailure>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(failure) => failure.kind(),
    }
}
