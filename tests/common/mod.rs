//! Common test utilities for E2E tests
//!
//! `FakeProvider` stands in for the GitHub and Google OAuth + REST
//! endpoints; `TestServer` runs the real router against it.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use followgate::{AppState, config};
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use serde_json::json;
use tokio::net::TcpListener;

pub const TARGET_ACCOUNT: &str = "bytemait";
pub const TARGET_CHANNEL: &str = "UCgIzTPYitha6idOdrr7M8sQ";
pub const SESSION_COOKIE: &str = "followgate_session";

// =============================================================================
// Fake provider
// =============================================================================

struct FakeGitHubUser {
    id: u64,
    login: String,
    following: HashSet<String>,
}

struct FakeGoogleUser {
    sub: String,
    email: String,
    subscriptions: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    /// code -> access token (codes are single-use)
    codes: HashMap<String, String>,
    github_users: HashMap<String, FakeGitHubUser>,
    google_users: HashMap<String, FakeGoogleUser>,
    page_size: usize,
    delay: Option<Duration>,
    hits: HashMap<&'static str, usize>,
}

impl FakeState {
    fn hit(&mut self, endpoint: &'static str) {
        *self.hits.entry(endpoint).or_default() += 1;
    }
}

/// In-process stand-in for GitHub and Google
#[derive(Clone)]
pub struct FakeProvider {
    pub base_url: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeProvider {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeState {
            page_size: 50,
            ..FakeState::default()
        }));

        let app = Router::new()
            .route("/github/login/oauth/access_token", post(github_token))
            .route("/github/api/user", get(github_user))
            .route("/github/api/user/following/:account", get(github_following))
            .route("/google/token", post(google_token))
            .route("/google/userinfo", get(google_userinfo))
            .route("/google/youtube/v3/subscriptions", get(google_subscriptions))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Register a GitHub user reachable through `code`
    pub fn add_github_user(&self, code: &str, token: &str, login: &str, follows_target: bool) {
        let mut state = self.state.lock().unwrap();
        let id = state.github_users.len() as u64 + 1;
        let mut following = HashSet::new();
        following.insert("someone-else".to_string());
        if follows_target {
            following.insert(TARGET_ACCOUNT.to_string());
        }
        state.github_users.insert(
            token.to_string(),
            FakeGitHubUser {
                id,
                login: login.to_string(),
                following,
            },
        );
        state.codes.insert(code.to_string(), token.to_string());
    }

    /// Register a Google user reachable through `code`
    pub fn add_google_user(&self, code: &str, token: &str, email: &str, subscriptions: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let sub = format!("google-{}", state.google_users.len() + 1);
        state.google_users.insert(
            token.to_string(),
            FakeGoogleUser {
                sub,
                email: email.to_string(),
                subscriptions: subscriptions.iter().map(|s| s.to_string()).collect(),
            },
        );
        state.codes.insert(code.to_string(), token.to_string());
    }

    /// Issue another single-use code for an existing token
    pub fn issue_code(&self, code: &str, token: &str) {
        let mut state = self.state.lock().unwrap();
        state.codes.insert(code.to_string(), token.to_string());
    }

    pub fn set_subscriptions(&self, token: &str, subscriptions: &[&str]) {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.google_users.get_mut(token) {
            user.subscriptions = subscriptions.iter().map(|s| s.to_string()).collect();
        }
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.state.lock().unwrap().page_size = page_size;
    }

    /// Delay relationship endpoints (following / subscriptions)
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// Number of requests served by an endpoint
    pub fn hits(&self, endpoint: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .hits
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }
}

type Shared = State<Arc<Mutex<FakeState>>>;

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
}

fn redeem_code(state: &mut FakeState, form: &HashMap<String, String>) -> Option<String> {
    if form.get("grant_type").map(String::as_str) != Some("authorization_code") {
        return None;
    }
    let code = form.get("code")?;
    state.codes.remove(code)
}

async fn github_token(State(state): Shared, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut state = state.lock().unwrap();
    state.hit("github_token");

    match redeem_code(&mut state, &form) {
        Some(token) => Json(json!({
            "access_token": token,
            "token_type": "bearer",
            "scope": "user:follow"
        }))
        .into_response(),
        // GitHub reports bad codes with 200 OK
        None => Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }))
        .into_response(),
    }
}

async fn github_user(State(state): Shared, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap();
    state.hit("github_user");

    let user = bearer(&headers).and_then(|token| state.github_users.get(&token));
    match user {
        Some(user) => Json(json!({
            "id": user.id,
            "login": user.login,
            "name": null,
            "email": null,
            "avatar_url": format!("https://avatars.example.com/{}", user.login)
        }))
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Bad credentials"})),
        )
            .into_response(),
    }
}

async fn github_following(
    State(state): Shared,
    Path(account): Path<String>,
    headers: HeaderMap,
) -> Response {
    let (delay, status) = {
        let mut state = state.lock().unwrap();
        state.hit("github_following");

        let status = match bearer(&headers).and_then(|token| state.github_users.get(&token)) {
            Some(user) if user.following.contains(&account) => StatusCode::NO_CONTENT,
            Some(_) => StatusCode::NOT_FOUND,
            None => StatusCode::UNAUTHORIZED,
        };
        (state.delay, status)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    status.into_response()
}

async fn google_token(State(state): Shared, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut state = state.lock().unwrap();
    state.hit("google_token");

    match redeem_code(&mut state, &form) {
        Some(token) => Json(json!({
            "access_token": token,
            "expires_in": 3599,
            "token_type": "Bearer",
            "scope": "https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/youtube.readonly"
        }))
        .into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Bad Request"})),
        )
            .into_response(),
    }
}

async fn google_userinfo(State(state): Shared, headers: HeaderMap) -> Response {
    let mut state = state.lock().unwrap();
    state.hit("google_userinfo");

    match bearer(&headers).and_then(|token| state.google_users.get(&token)) {
        Some(user) => Json(json!({
            "sub": user.sub,
            "email": user.email,
            "email_verified": true,
            "picture": "https://lh3.example.com/photo.jpg"
        }))
        .into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn google_subscriptions(
    State(state): Shared,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let (delay, response) = {
        let mut state = state.lock().unwrap();
        state.hit("google_subscriptions");
        let page_size = state.page_size.max(1);

        let response = match bearer(&headers).and_then(|token| state.google_users.get(&token)) {
            Some(_) if params.get("mine").map(String::as_str) != Some("true") => {
                StatusCode::BAD_REQUEST.into_response()
            }
            Some(user) => {
                let page: usize = params
                    .get("pageToken")
                    .and_then(|t| t.strip_prefix("page-"))
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(0);
                let start = page * page_size;
                let items: Vec<_> = user
                    .subscriptions
                    .iter()
                    .skip(start)
                    .take(page_size)
                    .map(|channel| {
                        json!({
                            "kind": "youtube#subscription",
                            "snippet": {
                                "title": format!("Channel {channel}"),
                                "resourceId": {"kind": "youtube#channel", "channelId": channel}
                            }
                        })
                    })
                    .collect();

                let mut body = json!({
                    "kind": "youtube#subscriptionListResponse",
                    "items": items
                });
                if start + page_size < user.subscriptions.len() {
                    body["nextPageToken"] = json!(format!("page-{}", page + 1));
                }
                Json(body).into_response()
            }
            None => StatusCode::UNAUTHORIZED.into_response(),
        };
        (state.delay, response)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    response
}

// =============================================================================
// Test server
// =============================================================================

/// Configuration pointing every provider endpoint at `fake_url`
pub fn test_config(fake_url: &str) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        session: config::SessionConfig {
            secret: "test-secret-key-32-bytes-long!!!".to_string(),
            max_age: 3600,
            cookie_name: SESSION_COOKIE.to_string(),
            max_sessions: 100,
        },
        http: config::HttpClientConfig {
            timeout_seconds: 2,
            user_agent: "followgate-test".to_string(),
        },
        github: config::GitHubConfig {
            client_id: "test-github-client".to_string(),
            client_secret: "test-github-secret".to_string(),
            callback_url: None,
            authorize_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: format!("{fake_url}/github/login/oauth/access_token"),
            api_url: format!("{fake_url}/github/api"),
            target_account: TARGET_ACCOUNT.to_string(),
        },
        google: config::GoogleConfig {
            client_id: "test-google-client".to_string(),
            client_secret: "test-google-secret".to_string(),
            callback_url: None,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: format!("{fake_url}/google/token"),
            userinfo_url: format!("{fake_url}/google/userinfo"),
            youtube_api_url: format!("{fake_url}/google"),
            target_channel_id: TARGET_CHANNEL.to_string(),
            target_channel_name: "BYTE".to_string(),
            max_subscription_pages: 10,
        },
        access: config::AccessConfig {
            require_session: true,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub fake: FakeProvider,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Start a fake provider and a server wired to it
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Same as `new`, with a hook to adjust the configuration
    pub async fn with_config(adjust: impl FnOnce(&mut config::AppConfig)) -> Self {
        let fake = FakeProvider::start().await;
        let mut config = test_config(&fake.base_url);
        adjust(&mut config);

        let state = AppState::new(config).unwrap();

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = followgate::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            fake,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Start a login and return the provider URL and state cookie value
    pub async fn begin_login(&self, provider: &str) -> (url::Url, String) {
        let response = self
            .client
            .get(self.url(&format!("/auth/{provider}")))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_redirection());

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location header");
        let location = url::Url::parse(location).expect("absolute provider URL");
        let state_cookie = cookie_value(&response, &state_cookie_name(provider))
            .expect("provider state cookie");

        (location, state_cookie)
    }

    /// Run the full redirect + callback round trip with `code`
    pub async fn login(&self, provider: &str, code: &str) -> reqwest::Response {
        self.login_from(provider, code, None).await
    }

    /// Same as [`login`](Self::login) from a browser already holding `session`
    pub async fn login_with_session(
        &self,
        provider: &str,
        code: &str,
        session: &str,
    ) -> reqwest::Response {
        self.login_from(provider, code, Some(session)).await
    }

    async fn login_from(
        &self,
        provider: &str,
        code: &str,
        session: Option<&str>,
    ) -> reqwest::Response {
        let (location, state_cookie) = self.begin_login(provider).await;
        let state = query_value(&location, "state").expect("state parameter");

        let mut cookies = format!("{}={state_cookie}", state_cookie_name(provider));
        if let Some(session) = session {
            cookies.push_str(&format!("; {SESSION_COOKIE}={session}"));
        }

        self.client
            .get(self.url(&format!("/auth/{provider}/callback")))
            .query(&[("code", code), ("state", state.as_str())])
            .header(COOKIE, cookies)
            .send()
            .await
            .unwrap()
    }

    /// GET a path with the given session cookie value
    pub async fn get_with_session(&self, path: &str, session: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(COOKIE, format!("{SESSION_COOKIE}={session}"))
            .send()
            .await
            .unwrap()
    }

    pub fn session_count(&self) -> u64 {
        self.state.sessions.len()
    }
}

/// Value of a non-empty cookie set by `response`
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(cookie_name, value)| *cookie_name == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Name of the CSRF state cookie set by `/auth/{provider}`
pub fn state_cookie_name(provider: &str) -> String {
    format!("oauth_state_{provider}")
}

pub fn query_value(url: &url::Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

pub fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}
