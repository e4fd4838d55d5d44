//! Session management
//!
//! Sessions live in a server-side keyed store. The browser only holds the
//! session id in an HMAC-signed cookie.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use thiserror::Error;

use super::identity::AuthenticatedIdentity;
use crate::error::AppError;
use crate::metrics::SESSIONS_ACTIVE;

/// Authenticated, entitled user session
///
/// Only created after the identity passed its entitlement check.
#[derive(Debug)]
pub struct Session {
    /// Opaque session id (ULID)
    pub id: String,
    pub identity: AuthenticatedIdentity,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(identity: AuthenticatedIdentity, max_age: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string(),
            identity,
            created_at: now,
            expires_at: now + max_age,
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Session store failures
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} already exists")]
    Duplicate(String),
}

/// Keyed session storage
///
/// Passed explicitly to the access gate; persisted sessions must be
/// readable by the very next request.
pub trait SessionStore: Send + Sync {
    /// Store a new session
    fn persist(&self, session: Session) -> Result<Arc<Session>, SessionError>;

    /// Fetch a live session; expired sessions load as `None`
    fn load(&self, id: &str) -> Option<Arc<Session>>;

    /// Drop a session (logout)
    fn remove(&self, id: &str);

    /// Number of sessions currently held
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process session store
///
/// Entries expire after the configured session max age. Past `max_sessions`
/// the least recently used session is evicted, so a new login is never
/// refused for lack of room.
pub struct MemorySessionStore {
    sessions: Cache<String, Arc<Session>>,
}

impl MemorySessionStore {
    /// Create new session store
    ///
    /// # Arguments
    /// * `max_sessions` - Maximum number of sessions held at once
    /// * `ttl` - Lifetime of a session
    pub fn new(max_sessions: u64, ttl: StdDuration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(max_sessions)
            .eviction_policy(EvictionPolicy::lru())
            .time_to_live(ttl)
            .build();

        Self { sessions }
    }

    fn refresh_gauge(&self) {
        SESSIONS_ACTIVE.set(i64::try_from(self.sessions.entry_count()).unwrap_or(i64::MAX));
    }
}

impl SessionStore for MemorySessionStore {
    fn persist(&self, session: Session) -> Result<Arc<Session>, SessionError> {
        if self.sessions.contains_key(&session.id) {
            return Err(SessionError::Duplicate(session.id));
        }

        let session = Arc::new(session);
        self.sessions.insert(session.id.clone(), session.clone());
        self.sessions.run_pending_tasks();
        self.refresh_gauge();
        Ok(session)
    }

    fn load(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.get(id)?;
        if session.is_expired() {
            self.sessions.invalidate(id);
            return None;
        }
        Some(session)
    }

    fn remove(&self, id: &str) {
        self.sessions.invalidate(id);
        self.refresh_gauge();
    }

    fn len(&self) -> u64 {
        self.sessions.run_pending_tasks();
        self.sessions.entry_count()
    }
}

/// Sign a session id for the session cookie
///
/// Token format: base64(id).base64(hmac_sha256(base64(id)))
///
/// # Arguments
/// * `session_id` - Id to sign
/// * `secret` - HMAC secret key
pub fn sign_session_id(session_id: &str, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(session_id.as_bytes());
    let signature = mac_for(&payload_b64, secret)?.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify a signed session cookie and return the session id
///
/// # Errors
/// Returns `Unauthorized` if the value is malformed or the signature is wrong
pub fn verify_session_cookie(value: &str, secret: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let (payload_b64, signature_b64) = value.split_once('.').ok_or(AppError::Unauthorized)?;

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;
    mac_for(payload_b64, secret)?
        .verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;
    String::from_utf8(payload).map_err(|_| AppError::Unauthorized)
}

fn mac_for(payload_b64: &str, secret: &str) -> Result<hmac::Hmac<sha2::Sha256>, AppError> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    Ok(mac)
}
