//! Shared request state: the backend client plus site configuration.

use crate::backend::{BackendClient, Provider};
use url::Url;

const DEFAULT_PROVIDERS: [Provider; 2] = [Provider::Google, Provider::Discord];
const ACCESS_TOKEN_FALLBACK_MAX_AGE_SECONDS: i64 = 60 * 60;
const REFRESH_TOKEN_MAX_AGE_SECONDS: i64 = 30 * 24 * 60 * 60;
const OAUTH_FLOW_MAX_AGE_SECONDS: i64 = 10 * 60;

#[derive(Clone, Debug)]
pub struct SiteConfig {
    site_url: String,
    providers: Vec<Provider>,
    debug_endpoints: bool,
}

impl SiteConfig {
    #[must_use]
    pub fn new(site_url: String) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            providers: DEFAULT_PROVIDERS.to_vec(),
            debug_endpoints: false,
        }
    }

    #[must_use]
    pub fn with_providers(mut self, providers: Vec<Provider>) -> Self {
        self.providers = providers;
        self
    }

    #[must_use]
    pub fn with_debug_endpoints(mut self, enabled: bool) -> Self {
        self.debug_endpoints = enabled;
        self
    }

    #[must_use]
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    #[must_use]
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    #[must_use]
    pub fn provider_enabled(&self, provider: Provider) -> bool {
        self.providers.contains(&provider)
    }

    #[must_use]
    pub fn debug_endpoints(&self) -> bool {
        self.debug_endpoints
    }

    /// Where the auth server sends the browser after the provider login.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.site_url)
    }

    /// Callback URL for one login attempt: the auth server hands `state` back unchanged.
    #[must_use]
    pub fn callback_url_with_state(&self, state: &str) -> String {
        match Url::parse(&self.callback_url()) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("state", state);
                url.to_string()
            }
            Err(_) => format!("{}?state={state}", self.callback_url()),
        }
    }

    /// Cookies only carry `Secure` when the site itself is served over https.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.site_url.starts_with("https://")
    }

    #[must_use]
    pub fn access_token_fallback_max_age_seconds(&self) -> i64 {
        ACCESS_TOKEN_FALLBACK_MAX_AGE_SECONDS
    }

    #[must_use]
    pub fn refresh_token_max_age_seconds(&self) -> i64 {
        REFRESH_TOKEN_MAX_AGE_SECONDS
    }

    #[must_use]
    pub fn oauth_flow_max_age_seconds(&self) -> i64 {
        OAUTH_FLOW_MAX_AGE_SECONDS
    }
}

#[derive(Clone, Debug)]
pub struct AppState {
    backend: BackendClient,
    config: SiteConfig,
}

impl AppState {
    #[must_use]
    pub fn new(backend: BackendClient, config: SiteConfig) -> Self {
        Self { backend, config }
    }

    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }
}
