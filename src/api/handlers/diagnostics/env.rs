use super::timestamp;
use crate::{GIT_COMMIT_HASH, api::AppState, backend::redact_key};
use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::sync::Arc;
use url::Url;

const HOSTED_DOMAIN: &str = ".supabase.co";
const JWT_PREFIX: &str = "eyJ";
const PUBLISHABLE_PREFIX: &str = "sb_publishable_";

pub async fn env(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(env_report(&state))
}

/// Configuration as the server sees it.
#[must_use]
pub fn env_report(state: &AppState) -> Value {
    let backend = state.backend();
    let config = state.config();
    let url_check = check_url(backend.base_url());
    let key_check = check_publishable_key(backend.publishable_key());

    let mut recommendations = Vec::new();
    if !url_check.https {
        recommendations.push("Backend URL should use https".to_string());
    }
    if !url_check.hosted {
        recommendations.push(format!(
            "Backend URL is not a {HOSTED_DOMAIN} project; make sure it points at the project API"
        ));
    }
    if !key_check.valid {
        recommendations.push(format!(
            "Publishable key should be a JWT ({JWT_PREFIX}...) or start with {PUBLISHABLE_PREFIX}"
        ));
    }
    if backend.secret_key().is_none() {
        recommendations.push(
            "Secret key is not configured: admin and profile lookups will fail".to_string(),
        );
    }
    if !config.secure_cookies() {
        recommendations.push(
            "Site URL is not https: auth cookies are sent without the Secure flag".to_string(),
        );
    }
    if recommendations.is_empty() {
        recommendations.push("Configuration looks good".to_string());
    }

    json!({
        "success": true,
        "backend": {
            "url": backend.base_url(),
            "has_publishable_key": !backend.publishable_key().expose_secret().is_empty(),
            "has_secret_key": backend.secret_key().is_some(),
            "publishable_key_prefix": redact_key(backend.publishable_key()),
            "secret_key_prefix": backend.secret_key().map(redact_key),
        },
        "url_validation": {
            "parses": url_check.parses,
            "https": url_check.https,
            "hosted": url_check.hosted,
        },
        "publishable_key_format": {
            "jwt": key_check.jwt,
            "publishable": key_check.publishable,
            "valid": key_check.valid,
        },
        "site": {
            "url": config.site_url(),
            "callback_url": config.callback_url(),
            "secure_cookies": config.secure_cookies(),
            "providers": config.providers(),
        },
        "runtime": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "commit": GIT_COMMIT_HASH,
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "timestamp": timestamp(),
        },
        "recommendations": recommendations,
    })
}

struct UrlCheck {
    parses: bool,
    https: bool,
    hosted: bool,
}

fn check_url(raw: &str) -> UrlCheck {
    match Url::parse(raw) {
        Ok(url) => UrlCheck {
            parses: true,
            https: url.scheme() == "https",
            hosted: url
                .host_str()
                .is_some_and(|host| host.ends_with(HOSTED_DOMAIN)),
        },
        Err(_) => UrlCheck {
            parses: false,
            https: false,
            hosted: false,
        },
    }
}

struct KeyCheck {
    jwt: bool,
    publishable: bool,
    valid: bool,
}

fn check_publishable_key(key: &SecretString) -> KeyCheck {
    let key = key.expose_secret();
    let jwt = key.starts_with(JWT_PREFIX);
    let publishable = key.starts_with(PUBLISHABLE_PREFIX);
    KeyCheck {
        jwt,
        publishable,
        valid: jwt || publishable,
    }
}
