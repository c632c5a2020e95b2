//! `GET /auth/callback`: where the auth server returns the browser after the provider login.

use super::{
    cookies::{self, FlowCookie},
    errors::{EXCHANGE_FAILED, INVALID_REQUEST},
};
use crate::api::AppState;
use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, HeaderValue, header::CACHE_CONTROL},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

const MISSING_VERIFIER: &str = "missing PKCE verifier";
const STATE_MISMATCH: &str = "OAuth state mismatch";
const MISSING_STATE: &str = "missing OAuth state";

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub state: Option<String>,
}

pub async fn callback(
    Query(query): Query<CallbackQuery>,
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    info!(
        has_code = query.code.is_some(),
        has_error = query.error.is_some(),
        has_state = query.state.is_some(),
        "auth callback received"
    );

    let site_url = state.config().site_url();

    if let Some(error) = non_empty(query.error.as_deref()) {
        let description = query.error_description.as_deref().unwrap_or_default();
        error!(error, description, "OAuth provider returned an error");
        return redirect(error_location(site_url, error, description), HeaderMap::new());
    }

    let Some(code) = non_empty(query.code.as_deref()) else {
        info!("no code or error in callback, redirecting home");
        return redirect(home_location(site_url), HeaderMap::new());
    };

    // Consumed either way: a flow cookie is good for one callback only.
    let mut response_headers = HeaderMap::new();
    cookies::append_cookies(
        &mut response_headers,
        [cookies::clear_cookie(
            state.config(),
            cookies::OAUTH_FLOW_COOKIE,
        )],
    );

    let flow = cookies::read_cookie(&headers, cookies::OAUTH_FLOW_COOKIE)
        .as_deref()
        .and_then(FlowCookie::parse);
    let Some(flow) = flow else {
        warn!("callback without a usable flow cookie");
        return redirect(
            error_location(site_url, INVALID_REQUEST, MISSING_VERIFIER),
            response_headers,
        );
    };

    let Some(returned_state) = non_empty(query.state.as_deref()) else {
        warn!("callback without state");
        return redirect(
            error_location(site_url, INVALID_REQUEST, MISSING_STATE),
            response_headers,
        );
    };
    if returned_state != flow.state {
        warn!("callback state does not match the login attempt");
        return redirect(
            error_location(site_url, INVALID_REQUEST, STATE_MISMATCH),
            response_headers,
        );
    }

    match state
        .backend()
        .exchange_code_for_session(code, &flow.verifier)
        .await
    {
        Ok(session) => {
            info!(user_id = %session.user.id, "OAuth login completed");
            match cookies::session_cookies(state.config(), &session) {
                Ok(values) => cookies::append_cookies(&mut response_headers, values.map(Ok)),
                Err(err) => {
                    error!("failed to build session cookies: {err}");
                    return redirect(
                        error_location(site_url, EXCHANGE_FAILED, "could not store the session"),
                        response_headers,
                    );
                }
            }
            redirect(home_location(site_url), response_headers)
        }
        Err(err) => {
            error!("code exchange failed: {err}");
            redirect(
                error_location(site_url, EXCHANGE_FAILED, &err.user_message()),
                response_headers,
            )
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn redirect(location: String, mut headers: HeaderMap) -> Response {
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    (headers, Redirect::to(&location)).into_response()
}

fn home_location(site_url: &str) -> String {
    format!("{site_url}/")
}

/// `<site>/?error=..&error_description=..`, both form encoded.
fn error_location(site_url: &str, error: &str, description: &str) -> String {
    let home = home_location(site_url);
    match Url::parse(&home) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("error", error)
                .append_pair("error_description", description);
            url.to_string()
        }
        Err(_) => home,
    }
}
