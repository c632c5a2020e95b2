use super::{BackendClient, BackendError};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};
use tracing::{debug, instrument};
use url::Url;
use utoipa::ToSchema;

// Forwarded to the identity provider: always show the account chooser and ask for a
// refresh token where the provider supports it.
const AUTHORIZE_QUERY_PARAMS: [(&str, &str); 2] =
    [("prompt", "select_account"), ("access_type", "offline")];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Discord,
    Twitter,
    Github,
}

impl Provider {
    pub const ALL: [Self; 4] = [Self::Google, Self::Discord, Self::Twitter, Self::Github];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Discord => "discord",
            Self::Twitter => "twitter",
            Self::Github => "github",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Discord => "Discord",
            Self::Twitter => "Twitter",
            Self::Github => "GitHub",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == normalized)
            .ok_or_else(|| format!("unsupported provider: {value}"))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub user_metadata: Map<String, Value>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub app_metadata: Map<String, Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl User {
    /// Non-empty string value from `user_metadata`.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Full name when the provider supplied one, otherwise the email address.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.metadata_str("full_name").or(self.email.as_deref())
    }
}

#[derive(Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user: User,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"REDACTED")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &"REDACTED")
            .field("user", &self.user.id)
            .finish()
    }
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

impl BackendClient {
    /// URL the browser is sent to in order to start the provider login.
    ///
    /// # Errors
    /// Returns an error if the backend base URL cannot be joined.
    pub fn authorize_url(
        &self,
        provider: Provider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Url, BackendError> {
        let mut url = self.endpoint("/auth/v1/authorize")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("provider", provider.as_str())
                .append_pair("redirect_to", redirect_to)
                .append_pair("code_challenge", code_challenge)
                .append_pair("code_challenge_method", "s256");
            for (key, value) in AUTHORIZE_QUERY_PARAMS {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Exchange an authorization code plus the PKCE verifier for a session.
    ///
    /// # Errors
    /// Returns an error if the request fails or the auth server rejects the grant.
    #[instrument(skip(self, auth_code, code_verifier))]
    pub async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, BackendError> {
        let mut url = self.endpoint("/auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");

        let request = self
            .anon_request(Method::POST, url.clone())
            .json(&PkceGrant {
                auth_code,
                code_verifier,
            });
        let session: Session = self.send_json(request, &url).await?;

        debug!(user_id = %session.user.id, "authorization code exchanged");
        Ok(session)
    }

    /// # Errors
    /// Returns an error if the refresh token is rejected or the request fails.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let mut url = self.endpoint("/auth/v1/token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let request = self
            .anon_request(Method::POST, url.clone())
            .json(&RefreshGrant { refresh_token });
        let session: Session = self.send_json(request, &url).await?;

        debug!(user_id = %session.user.id, "session refreshed");
        Ok(session)
    }

    /// Validate an access token and return its user.
    ///
    /// # Errors
    /// Returns an error if the token is rejected or the request fails.
    #[instrument(skip(self, access_token))]
    pub async fn get_user(&self, access_token: &str) -> Result<User, BackendError> {
        let url = self.endpoint("/auth/v1/user")?;
        let request = self.user_request(Method::GET, url.clone(), access_token);
        self.send_json(request, &url).await
    }

    /// Revoke the session behind `access_token` (this device only).
    ///
    /// # Errors
    /// Returns an error if the request fails or the auth server rejects it.
    #[instrument(skip(self, access_token))]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let mut url = self.endpoint("/auth/v1/logout")?;
        url.query_pairs_mut().append_pair("scope", "local");
        let request = self.user_request(Method::POST, url.clone(), access_token);
        self.send(request, &url).await?;
        Ok(())
    }
}
