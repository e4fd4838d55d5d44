//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (`FOLLOWGATE__*`)
//! 4. Well-known plain variables (`SECRET_KEY`, `GITHUB_CLIENT_ID`, ...)

use serde::Deserialize;
use std::net::IpAddr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub http: HttpClientConfig,
    pub github: GitHubConfig,
    pub google: GoogleConfig,
    pub access: AccessConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (default: 3000)
    pub port: u16,
    /// Public domain (e.g., "gate.example.com" or "localhost:3000")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the public base URL
    ///
    /// # Returns
    /// Full URL like "https://gate.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie signing secret (32+ bytes), read from `SECRET_KEY`
    pub secret: String,
    /// Session max age in seconds (default: 86400 = 1 day)
    pub max_age: i64,
    /// Name of the session cookie
    pub cookie_name: String,
    /// Upper bound on concurrently held sessions
    pub max_sessions: u64,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientConfig {
    /// Per-request timeout for provider calls
    pub timeout_seconds: u64,
    pub user_agent: String,
}

/// GitHub OAuth and API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Defaults to `{base_url}/auth/github/callback`
    pub callback_url: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    /// REST API root (e.g. "https://api.github.com")
    pub api_url: String,
    /// Account the user must follow
    pub target_account: String,
}

/// Google OAuth and YouTube Data API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Defaults to `{base_url}/auth/google/callback`
    pub callback_url: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// YouTube Data API root (e.g. "https://youtube.googleapis.com")
    pub youtube_api_url: String,
    /// Channel the user must be subscribed to
    pub target_channel_id: String,
    /// Channel name shown in the denial message
    pub target_channel_name: String,
    /// Number of subscription pages scanned before giving up
    pub max_subscription_pages: u32,
}

/// Access policy for the private page
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// Require a valid session to render `/private`
    pub require_session: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        format!("followgate={0},tower_http={0}", self.level.to_ascii_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FOLLOWGATE__*)
    /// 5. SECRET_KEY, GITHUB_CLIENT_ID, GITHUB_CLIENT_SECRET,
    ///    GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET, PORT
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.domain", "localhost:3000")?
            .set_default("server.protocol", "http")?
            .set_default("session.max_age", 86400)?
            .set_default("session.cookie_name", "followgate_session")?
            .set_default("session.max_sessions", 10_000)?
            .set_default("http.timeout_seconds", 5)?
            .set_default("http.user_agent", "followgate/0.1.0")?
            .set_default("github.authorize_url", "https://github.com/login/oauth/authorize")?
            .set_default("github.token_url", "https://github.com/login/oauth/access_token")?
            .set_default("github.api_url", "https://api.github.com")?
            .set_default("github.target_account", "bytemait")?
            .set_default(
                "google.authorize_url",
                "https://accounts.google.com/o/oauth2/v2/auth",
            )?
            .set_default("google.token_url", "https://oauth2.googleapis.com/token")?
            .set_default(
                "google.userinfo_url",
                "https://www.googleapis.com/oauth2/v3/userinfo",
            )?
            .set_default("google.youtube_api_url", "https://youtube.googleapis.com")?
            .set_default("google.target_channel_id", "UCgIzTPYitha6idOdrr7M8sQ")?
            .set_default("google.target_channel_name", "BYTE")?
            .set_default("google.max_subscription_pages", 10)?
            .set_default("access.require_session", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("FOLLOWGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("session.secret", env("SECRET_KEY"))?
            .set_override_option("github.client_id", env("GITHUB_CLIENT_ID"))?
            .set_override_option("github.client_secret", env("GITHUB_CLIENT_SECRET"))?
            .set_override_option("google.client_id", env("GOOGLE_CLIENT_ID"))?
            .set_override_option("google.client_secret", env("GOOGLE_CLIENT_SECRET"))?
            .set_override_option("server.port", env("PORT"))?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    /// Redirect URI registered with GitHub
    pub fn github_callback_url(&self) -> String {
        self.github
            .callback_url
            .clone()
            .unwrap_or_else(|| format!("{}/auth/github/callback", self.server.base_url()))
    }

    /// Redirect URI registered with Google
    pub fn google_callback_url(&self) -> String {
        self.google
            .callback_url
            .clone()
            .unwrap_or_else(|| format!("{}/auth/google/callback", self.server.base_url()))
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;
        const MAX_SESSION_AGE_SECONDS: i64 = 365 * 24 * 60 * 60;

        if self.session.secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "session.secret (SECRET_KEY) must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.session.max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "session.max_age must be greater than 0".to_string(),
            ));
        }

        if self.http.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "http.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.google.max_subscription_pages == 0 {
            return Err(crate::error::AppError::Config(
                "google.max_subscription_pages must be at least 1".to_string(),
            ));
        }

        for (key, value) in [
            ("github.client_id", &self.github.client_id),
            ("google.client_id", &self.google.client_id),
        ] {
            if value.trim().is_empty() {
                return Err(crate::error::AppError::Config(format!(
                    "{key} must not be empty"
                )));
            }
        }

        if self.session.max_age > MAX_SESSION_AGE_SECONDS {
            return Err(crate::error::AppError::Config(format!(
                "session.max_age must not exceed {} seconds (one year)",
                MAX_SESSION_AGE_SECONDS
            )));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error (got {:?})",
                self.logging.level
            )));
        }

        if !matches!(self.logging.format.to_ascii_lowercase().as_str(), "pretty" | "json") {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\" (got {:?})",
                self.logging.format
            )));
        }

        if self.should_use_secure_cookies() && !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
