//! OAuth authentication and access control
//!
//! Handles:
//! - GitHub and Google OAuth flows
//! - Follow / subscription entitlement checks
//! - Session management

pub mod entitlement;
pub mod gate;
pub mod identity;
mod middleware;
mod oauth;
pub mod provider;
pub mod session;

pub use entitlement::EntitlementChecker;
pub use gate::{AccessGate, AuthStage};
pub use identity::{AuthenticatedIdentity, IdentityVerifier, Profile};
pub use middleware::{MaybeSession, session_id_from_jar};
pub use oauth::{CallbackQuery, PRIVATE_PATH, STATE_COOKIE_PREFIX, auth_router, state_cookie_name};
pub use provider::Provider;
pub use session::{
    MemorySessionStore, Session, SessionError, SessionStore, sign_session_id,
    verify_session_cookie,
};
