//! REST client for the hosted backend.
//!
//! The backend exposes an auth server under `/auth/v1` and a `PostgREST` database API under
//! `/rest/v1`. Both expect an `apikey` header plus a bearer token; which key/token pair is sent
//! depends on who the call acts for:
//!
//! - anonymous: publishable key as both `apikey` and bearer
//! - user: publishable key as `apikey`, the user's access token as bearer
//! - service: secret key as both (bypasses row-level security, admin/diagnostics only)

pub mod auth;
pub mod pkce;
pub mod rest;

pub use auth::{Provider, Session, User};
pub use rest::{AuthorMetadata, NewPost, Post};

use crate::APP_USER_AGENT;
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode, header::LOCATION, redirect::Policy,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{fmt, time::Duration};
use thiserror::Error;
use tracing::{Instrument, debug, info_span};
use url::Url;

const REQUEST_TIMEOUT_SECONDS: u64 = 10;
const PROBE_TIMEOUT_SECONDS: u64 = 5;
const KEY_PREFIX_CHARS: usize = 10;

/// Printable form of an API key: the first 10 characters followed by `...`.
#[must_use]
pub fn redact_key(key: &SecretString) -> String {
    let prefix: String = key.expose_secret().chars().take(KEY_PREFIX_CHARS).collect();
    format!("{prefix}...")
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend returned {}: {}", .0.status, .0.message)]
    Api(ApiError),
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("backend returned an empty result from {0}")]
    EmptyResponse(String),
    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("secret key is not configured")]
    MissingSecretKey,
}

impl BackendError {
    /// HTTP status returned by the backend, if the request got that far.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api(api) => StatusCode::from_u16(api.status).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(api) => Some(api),
            _ => None,
        }
    }

    /// True when the backend rejected the credentials (expired or revoked token).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        )
    }

    /// Message suitable for showing to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(api) => api.message.clone(),
            other => other.to_string(),
        }
    }
}

/// Non-success response from either the auth server or `PostgREST`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code}): {}", self.status, self.message),
            None => write!(f, "{}: {}", self.status, self.message),
        }
    }
}

// Union of the auth server error shapes (`{error, error_description}` and
// `{code, error_code, msg}`) and PostgREST's (`{code, message, details, hint}`).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<Value>,
    error_code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    details: Option<Value>,
    hint: Option<String>,
}

impl ApiError {
    /// Build an `ApiError` from a status and the raw response body.
    #[must_use]
    pub fn parse(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

        // Numeric `code` fields only repeat the HTTP status.
        let code = parsed
            .error_code
            .clone()
            .or_else(|| match &parsed.code {
                Some(Value::String(code)) => Some(code.clone()),
                _ => None,
            })
            .or_else(|| parsed.error.clone());

        let message = [
            parsed.msg,
            parsed.message,
            parsed.error_description,
            parsed.error,
        ]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty() && !trimmed.starts_with('{')).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

        let details = match parsed.details {
            Some(Value::String(details)) => Some(details),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        Self {
            status: status.as_u16(),
            code,
            message,
            details,
            hint: parsed.hint,
        }
    }

    async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::parse(status, &body)
    }
}

/// Outcome of a diagnostic request. Never an error: failures are recorded in `error`.
#[derive(Clone, Debug, Serialize)]
pub struct Probe {
    pub url: String,
    pub status: Option<u16>,
    pub ok: bool,
    pub status_text: Option<String>,
    pub location: Option<String>,
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BackendClient {
    http: Client,
    probe_http: Client,
    base_url: String,
    publishable_key: SecretString,
    secret_key: Option<SecretString>,
}

impl BackendClient {
    /// # Errors
    /// Returns an error if the base URL is not an absolute http(s) URL or the HTTP client
    /// cannot be built.
    pub fn new(
        base_url: &str,
        publishable_key: SecretString,
        secret_key: Option<SecretString>,
    ) -> Result<Self, BackendError> {
        let parsed = Url::parse(base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(BackendError::InvalidUrl(url::ParseError::EmptyHost));
        }

        let build_error = |source| BackendError::Transport {
            url: base_url.to_string(),
            source,
        };

        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(build_error)?;

        // Diagnostics want to see the redirect itself, not where it leads.
        let probe_http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECONDS))
            .redirect(Policy::none())
            .build()
            .map_err(build_error)?;

        Ok(Self {
            http,
            probe_http,
            base_url: base_url.trim_end_matches('/').to_string(),
            publishable_key,
            secret_key,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn publishable_key(&self) -> &SecretString {
        &self.publishable_key
    }

    #[must_use]
    pub fn secret_key(&self) -> Option<&SecretString> {
        self.secret_key.as_ref()
    }

    /// Absolute URL for a backend path such as `/auth/v1/user`.
    ///
    /// # Errors
    /// Returns an error if the joined URL does not parse.
    pub fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        let url = Url::parse(&format!("{}{path}", self.base_url))?;
        debug!("endpoint URL: {}", url);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, api_key: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", api_key)
            .bearer_auth(bearer)
    }

    pub(crate) fn anon_request(&self, method: Method, url: Url) -> RequestBuilder {
        let key = self.publishable_key.expose_secret();
        self.request(method, url, key, key)
    }

    pub(crate) fn user_request(
        &self,
        method: Method,
        url: Url,
        access_token: &str,
    ) -> RequestBuilder {
        self.request(
            method,
            url,
            self.publishable_key.expose_secret(),
            access_token,
        )
    }

    pub(crate) fn service_request(
        &self,
        method: Method,
        url: Url,
    ) -> Result<RequestBuilder, BackendError> {
        let key = self
            .secret_key
            .as_ref()
            .ok_or(BackendError::MissingSecretKey)?
            .expose_secret();
        Ok(self.request(method, url, key, key))
    }

    /// Service credentials when configured, anonymous otherwise.
    pub(crate) fn best_effort_request(&self, method: Method, url: Url) -> RequestBuilder {
        match self.secret_key.as_ref() {
            Some(key) => {
                let key = key.expose_secret();
                self.request(method, url, key, key)
            }
            None => self.anon_request(method, url),
        }
    }

    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<Response, BackendError> {
        let span = info_span!("backend.request", url = %url.path());
        let response = request
            .send()
            .instrument(span)
            .await
            .map_err(|source| BackendError::Transport {
                url: url.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let error = ApiError::from_response(response).await;
            debug!("backend error from {}: {}", url.path(), error);
            Err(BackendError::Api(error))
        }
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T, BackendError> {
        let response = self.send(request, url).await?;
        let body = response
            .text()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.to_string(),
                source,
            })?;
        serde_json::from_str(&body).map_err(|source| BackendError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Issue a request with anonymous credentials and record what came back.
    /// Redirects are not followed so the `Location` of OAuth endpoints can be inspected.
    pub async fn probe(&self, method: Method, url: &Url) -> Probe {
        let key = self.publishable_key.expose_secret();
        let request = self
            .probe_http
            .request(method, url.clone())
            .header("apikey", key)
            .bearer_auth(key);

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                Probe {
                    url: url.to_string(),
                    status: Some(status.as_u16()),
                    ok: status.is_success(),
                    status_text: status.canonical_reason().map(str::to_string),
                    location: response
                        .headers()
                        .get(LOCATION)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string),
                    error: None,
                }
            }
            Err(err) => Probe {
                url: url.to_string(),
                status: None,
                ok: false,
                status_text: None,
                location: None,
                error: Some(err.to_string()),
            },
        }
    }

    /// Reachability of the auth server, used by `/health`.
    pub async fn auth_healthy(&self) -> bool {
        let Ok(url) = self.endpoint("/auth/v1/health") else {
            return false;
        };
        let request = self.anon_request(Method::GET, url.clone());
        self.send(request, &url).await.is_ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    pub(crate) fn client_for(base_url: &str) -> BackendClient {
        match BackendClient::new(
            base_url,
            SecretString::from("publishable-key".to_string()),
            Some(SecretString::from("secret-key".to_string())),
        ) {
            Ok(client) => client,
            Err(err) => panic!("failed to build backend client: {err}"),
        }
    }

    #[test]
    fn redact_key_keeps_ten_characters() {
        let key = SecretString::from("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.payload".to_string());
        assert_eq!(redact_key(&key), "eyJhbGciOi...");
        assert_eq!(redact_key(&SecretString::from("short".to_string())), "short...");
    }

    #[test]
    fn parse_postgrest_error() {
        let body = r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#;
        let error = ApiError::parse(StatusCode::NOT_ACCEPTABLE, body);
        assert_eq!(error.status, 406);
        assert_eq!(error.code.as_deref(), Some("PGRST116"));
        assert_eq!(
            error.message,
            "JSON object requested, multiple (or no) rows returned"
        );
        assert_eq!(error.details.as_deref(), Some("The result contains 0 rows"));
        assert_eq!(error.hint, None);
    }

    #[test]
    fn parse_auth_oauth_error() {
        let body = r#"{"error":"invalid_grant","error_description":"code challenge does not match previously saved code verifier"}"#;
        let error = ApiError::parse(StatusCode::BAD_REQUEST, body);
        assert_eq!(error.code.as_deref(), Some("invalid_grant"));
        assert_eq!(
            error.message,
            "code challenge does not match previously saved code verifier"
        );
    }

    #[test]
    fn parse_auth_numeric_code_uses_error_code() {
        let body = r#"{"code":400,"error_code":"validation_failed","msg":"Unsupported provider: provider is not enabled"}"#;
        let error = ApiError::parse(StatusCode::BAD_REQUEST, body);
        assert_eq!(error.code.as_deref(), Some("validation_failed"));
        assert_eq!(error.message, "Unsupported provider: provider is not enabled");
    }

    #[test]
    fn parse_plain_text_and_empty_bodies() {
        let error = ApiError::parse(StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert_eq!(error.message, "upstream unavailable");
        assert_eq!(error.code, None);

        let error = ApiError::parse(StatusCode::UNAUTHORIZED, "");
        assert_eq!(error.message, "Unauthorized");
    }

    #[test]
    fn unauthorized_detection() {
        let error = BackendError::Api(ApiError::parse(StatusCode::UNAUTHORIZED, "{}"));
        assert!(error.is_unauthorized());
        let error = BackendError::Api(ApiError::parse(StatusCode::BAD_REQUEST, "{}"));
        assert!(!error.is_unauthorized());
        assert!(!BackendError::MissingSecretKey.is_unauthorized());
    }

    #[test]
    fn endpoint_trims_trailing_slash() -> Result<(), BackendError> {
        let client = client_for("https://project.supabase.co/");
        assert_eq!(client.base_url(), "https://project.supabase.co");
        let url = client.endpoint("/auth/v1/user")?;
        assert_eq!(url.as_str(), "https://project.supabase.co/auth/v1/user");
        Ok(())
    }

    #[test]
    fn new_rejects_non_http_urls() {
        let result = BackendClient::new(
            "ftp://project.supabase.co",
            SecretString::from("key".to_string()),
            None,
        );
        assert!(matches!(result, Err(BackendError::InvalidUrl(_))));

        let result = BackendClient::new("not a url", SecretString::from("key".to_string()), None);
        assert!(matches!(result, Err(BackendError::InvalidUrl(_))));
    }

    #[test]
    fn service_request_requires_secret_key() -> Result<(), BackendError> {
        let client = BackendClient::new(
            "https://project.supabase.co",
            SecretString::from("key".to_string()),
            None,
        )?;
        let url = client.endpoint("/rest/v1/ai_user")?;
        assert!(matches!(
            client.service_request(Method::GET, url),
            Err(BackendError::MissingSecretKey)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn probe_records_redirect_location() -> Result<(), BackendError> {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/authorize"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "https://accounts.google.com/o/oauth2/auth"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let url = client.endpoint("/auth/v1/authorize")?;
        let probe = client.probe(Method::GET, &url).await;
        assert_eq!(probe.status, Some(302));
        assert!(!probe.ok);
        assert_eq!(
            probe.location.as_deref(),
            Some("https://accounts.google.com/o/oauth2/auth")
        );
        assert!(probe.error.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn probe_records_transport_error() -> Result<(), BackendError> {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let client = client_for("http://127.0.0.1:9");
        let url = client.endpoint("/rest/v1/")?;
        let probe = client.probe(Method::HEAD, &url).await;
        assert_eq!(probe.status, None);
        assert!(probe.error.is_some());
        Ok(())
    }
}
