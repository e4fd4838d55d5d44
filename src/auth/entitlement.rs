//! Entitlement checks
//!
//! Asks the provider whether the authenticated identity has the required
//! relationship. Every error collapses to `false`: access is only granted
//! on a positive answer.

use std::time::Instant;

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::identity::outcome_label;
use super::provider::Provider;
use crate::config::AppConfig;
use crate::error::AuthFailure;
use crate::metrics::observe_provider_call;

/// Page size requested from the subscriptions listing (API maximum)
const SUBSCRIPTIONS_PAGE_SIZE: &str = "50";

/// One page of `GET /youtube/v3/subscriptions`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPage {
    #[serde(default)]
    pub items: Vec<Subscription>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Subscription {
    pub snippet: Option<SubscriptionSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnippet {
    pub resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub channel_id: Option<String>,
}

impl SubscriptionPage {
    /// Whether any item on this page points at `channel_id`
    pub fn contains_channel(&self, channel_id: &str) -> bool {
        self.items.iter().any(|item| {
            item.snippet
                .as_ref()
                .and_then(|snippet| snippet.resource_id.as_ref())
                .and_then(|resource| resource.channel_id.as_deref())
                == Some(channel_id)
        })
    }

    /// Token for the following page, if the listing continues
    fn next_page(&self) -> Option<&str> {
        self.next_page_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

/// Checks provider-side relationships
///
/// Results are never cached; each call queries the provider.
pub struct EntitlementChecker<'a> {
    config: &'a AppConfig,
    http_client: &'a reqwest::Client,
}

impl<'a> EntitlementChecker<'a> {
    pub fn new(config: &'a AppConfig, http_client: &'a reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Check whether the token's identity is entitled to access
    ///
    /// # Returns
    /// `true` only on a positive provider answer
    pub async fn check(&self, provider: Provider, access_token: &SecretString) -> bool {
        match provider {
            Provider::GitHub => self.follows_target_account(access_token).await,
            Provider::Google => self.subscribed_to_target_channel(access_token).await,
        }
    }

    /// GitHub: `GET /user/following/{account}` answers 204 when following
    async fn follows_target_account(&self, access_token: &SecretString) -> bool {
        let target = &self.config.github.target_account;
        let url = format!(
            "{}/user/following/{}",
            self.config.github.api_url.trim_end_matches('/'),
            target
        );

        let started = Instant::now();
        let result = self
            .http_client
            .get(&url)
            .bearer_auth(access_token.expose_secret())
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await;

        let (outcome, following) = match result {
            Ok(response) if response.status() == StatusCode::NO_CONTENT => ("ok", true),
            Ok(response) => {
                tracing::info!(
                    status = %response.status(),
                    target = %target,
                    "GitHub follow check answered negatively"
                );
                ("denied", false)
            }
            Err(error) => {
                tracing::warn!(%error, target = %target, "GitHub follow check failed");
                ("network_failure", false)
            }
        };

        observe_provider_call(
            Provider::GitHub.as_str(),
            "following",
            outcome,
            started.elapsed().as_secs_f64(),
        );
        following
    }

    /// Google: scan the caller's YouTube subscriptions for the target
    ///
    /// Pages are followed until the channel is found, the listing ends, or
    /// `google.max_subscription_pages` pages have been read.
    async fn subscribed_to_target_channel(&self, access_token: &SecretString) -> bool {
        let target = &self.config.google.target_channel_id;
        let max_pages = self.config.google.max_subscription_pages;
        let mut page_token: Option<String> = None;

        for page_number in 1..=max_pages {
            let page = match self
                .fetch_subscription_page(access_token, page_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(failure) => {
                    tracing::warn!(
                        error = %failure,
                        page = page_number,
                        "YouTube subscription lookup failed"
                    );
                    return false;
                }
            };

            if page.contains_channel(target) {
                tracing::debug!(page = page_number, "Target channel found in subscriptions");
                return true;
            }

            match page.next_page() {
                Some(next) => page_token = Some(next.to_string()),
                None => {
                    tracing::info!(
                        pages = page_number,
                        channel = %target,
                        "Target channel not in subscriptions"
                    );
                    return false;
                }
            }
        }

        tracing::info!(
            pages = max_pages,
            channel = %target,
            "Subscription scan reached page cap without finding target channel"
        );
        false
    }

    async fn fetch_subscription_page(
        &self,
        access_token: &SecretString,
        page_token: Option<&str>,
    ) -> Result<SubscriptionPage, AuthFailure> {
        let started = Instant::now();
        let result = self.request_subscription_page(access_token, page_token).await;

        observe_provider_call(
            Provider::Google.as_str(),
            "subscriptions",
            outcome_label(&result),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn request_subscription_page(
        &self,
        access_token: &SecretString,
        page_token: Option<&str>,
    ) -> Result<SubscriptionPage, AuthFailure> {
        let url = format!(
            "{}/youtube/v3/subscriptions",
            self.config.google.youtube_api_url.trim_end_matches('/')
        );

        let mut query = vec![
            ("part", "snippet"),
            ("mine", "true"),
            ("maxResults", SUBSCRIPTIONS_PAGE_SIZE),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token.expose_secret())
            .header(ACCEPT, "application/json")
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthFailure::ProviderRejected(format!(
                "subscriptions endpoint returned {status}"
            )));
        }

        Ok(response.json().await?)
    }
}
