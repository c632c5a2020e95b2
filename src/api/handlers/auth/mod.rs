//! OAuth login, callback and cookie sessions.
//!
//! ## Flow
//!
//! 1. `GET /auth/login/{provider}` creates a state and a PKCE verifier, stores both in the
//!    `rugbot_oauth_flow` cookie and redirects to the auth server's authorize endpoint with the
//!    S256 challenge.
//! 2. The provider sends the browser back through the auth server to `GET /auth/callback` with a
//!    `code`. The callback exchanges it together with the verifier from the cookie and stores the
//!    resulting tokens in `HttpOnly` cookies.
//! 3. Every later request resolves the session from the bearer header or the access cookie. An
//!    expired access token is refreshed once when a refresh cookie is present.
//!
//! Failures in steps 1 and 2 never render an error page here: they are logged and the browser is
//! redirected to the login page with `?error=` and `?error_description=`.

pub mod callback;
pub mod cookies;
pub mod errors;
pub mod login;
pub mod session;

use crate::{
    api::AppState,
    backend::{BackendError, Session, User},
};
use axum::http::HeaderMap;
use tracing::{debug, warn};

/// A validated user plus the token that proved it.
pub struct ResolvedSession {
    pub user: User,
    pub access_token: String,
    /// Set when the access token had to be refreshed; its cookies must be re-issued.
    pub refreshed: Option<Session>,
}

impl ResolvedSession {
    /// `Set-Cookie` headers to attach to the response, empty unless the session was refreshed.
    #[must_use]
    pub fn cookie_headers(&self, state: &AppState) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(session) = &self.refreshed {
            match cookies::session_cookies(state.config(), session) {
                Ok(values) => cookies::append_cookies(&mut headers, values.map(Ok)),
                Err(err) => warn!("failed to build refreshed session cookies: {err}"),
            }
        }
        headers
    }
}

/// Resolve the caller's session.
///
/// Returns `Ok(None)` when there are no credentials or the backend rejects them and no refresh
/// is possible.
///
/// # Errors
/// Returns the backend error when the auth server cannot be reached or answers unexpectedly.
pub async fn resolve_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<ResolvedSession>, BackendError> {
    if let Some(access_token) = cookies::extract_access_token(headers) {
        match state.backend().get_user(&access_token).await {
            Ok(user) => {
                return Ok(Some(ResolvedSession {
                    user,
                    access_token,
                    refreshed: None,
                }));
            }
            Err(err) if err.is_unauthorized() => {
                debug!("access token rejected, trying refresh");
            }
            Err(err) => return Err(err),
        }
    }

    let Some(refresh_token) = cookies::read_cookie(headers, cookies::REFRESH_TOKEN_COOKIE) else {
        return Ok(None);
    };

    match state.backend().refresh_session(&refresh_token).await {
        Ok(session) => Ok(Some(ResolvedSession {
            user: session.user.clone(),
            access_token: session.access_token.clone(),
            refreshed: Some(session),
        })),
        Err(BackendError::Api(api)) => {
            debug!("refresh token rejected: {api}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// `Set-Cookie` headers removing every auth cookie.
#[must_use]
pub fn clear_auth_cookies(state: &AppState) -> HeaderMap {
    let config = state.config();
    let mut headers = HeaderMap::new();
    cookies::append_cookies(
        &mut headers,
        [
            cookies::ACCESS_TOKEN_COOKIE,
            cookies::REFRESH_TOKEN_COOKIE,
            cookies::OAUTH_FLOW_COOKIE,
        ]
        .map(|name| cookies::clear_cookie(config, name)),
    );
    headers
}
