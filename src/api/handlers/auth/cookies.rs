//! Auth cookies and credential extraction.
//!
//! All cookies are `Path=/; HttpOnly; SameSite=Lax`, plus `Secure` when the site runs on https.
//! The login flow cookie holds `<state>.<verifier>`: both halves are base64url, so the `.`
//! separator is unambiguous.

use crate::{
    api::SiteConfig,
    backend::{Session, pkce},
};
use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
};

pub const ACCESS_TOKEN_COOKIE: &str = "rugbot_access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "rugbot_refresh_token";
pub const OAUTH_FLOW_COOKIE: &str = "rugbot_oauth_flow";

fn build_cookie(
    config: &SiteConfig,
    name: &str,
    value: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.secure_cookies() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Access and refresh token cookies for a freshly issued session.
pub fn session_cookies(
    config: &SiteConfig,
    session: &Session,
) -> Result<[HeaderValue; 2], InvalidHeaderValue> {
    let access_max_age = session
        .expires_in
        .filter(|seconds| *seconds > 0)
        .unwrap_or_else(|| config.access_token_fallback_max_age_seconds());
    Ok([
        build_cookie(
            config,
            ACCESS_TOKEN_COOKIE,
            &session.access_token,
            access_max_age,
        )?,
        build_cookie(
            config,
            REFRESH_TOKEN_COOKIE,
            &session.refresh_token,
            config.refresh_token_max_age_seconds(),
        )?,
    ])
}

pub fn flow_cookie(config: &SiteConfig, flow: &FlowCookie) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(
        config,
        OAUTH_FLOW_COOKIE,
        &flow.encode(),
        config.oauth_flow_max_age_seconds(),
    )
}

pub fn clear_cookie(config: &SiteConfig, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, name, "", 0)
}

/// Append `Set-Cookie` headers, skipping values that failed to build.
pub fn append_cookies<I>(headers: &mut HeaderMap, cookies: I)
where
    I: IntoIterator<Item = Result<HeaderValue, InvalidHeaderValue>>,
{
    for cookie in cookies.into_iter().flatten() {
        headers.append(SET_COOKIE, cookie);
    }
}

/// Value of the named cookie from the request `Cookie` header(s).
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Bearer header first, then the access token cookie.
#[must_use]
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    extract_bearer_token(headers).or_else(|| read_cookie(headers, ACCESS_TOKEN_COOKIE))
}

/// State and PKCE verifier of one login attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct FlowCookie {
    pub state: String,
    pub verifier: String,
}

impl FlowCookie {
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}.{}", self.state, self.verifier)
    }

    /// `None` unless both parts are present and the verifier is well formed.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (state, verifier) = raw.trim().split_once('.')?;
        let state_ok = !state.is_empty()
            && state
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'));
        if !state_ok || !pkce::valid_code_verifier(verifier) {
            return None;
        }
        Some(Self {
            state: state.to_string(),
            verifier: verifier.to_string(),
        })
    }
}

impl std::fmt::Debug for FlowCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowCookie")
            .field("state", &self.state)
            .field("verifier", &"***")
            .finish()
    }
}
