use super::timestamp;
use crate::{
    api::AppState,
    backend::{Provider, pkce},
};
use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc};
use url::Url;

/// Query parameters an identity provider's authorize URL is expected to carry.
const PROVIDER_PARAMS: [&str; 5] = ["client_id", "redirect_uri", "response_type", "scope", "state"];

pub async fn oauth(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(oauth_report(&state).await)
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct LocationAnalysis {
    pub host: Option<String>,
    pub present: Vec<String>,
    pub missing: Vec<String>,
    pub redirect_uri: Option<String>,
    pub error: Option<String>,
}

impl LocationAnalysis {
    /// Whether the redirect goes to the identity provider with a full authorize request.
    #[must_use]
    pub fn looks_like_provider(&self) -> bool {
        self.missing.is_empty() && self.error.is_none()
    }
}

/// Break down the `Location` the auth server redirected to.
#[must_use]
pub fn analyze_location(location: &str) -> LocationAnalysis {
    let Ok(url) = Url::parse(location) else {
        return LocationAnalysis {
            error: Some(format!("unparseable location: {location}")),
            ..LocationAnalysis::default()
        };
    };
    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    let (present, missing): (Vec<String>, Vec<String>) = PROVIDER_PARAMS
        .iter()
        .map(|param| (*param).to_string())
        .partition(|param| query.contains_key(param));

    LocationAnalysis {
        host: url.host_str().map(str::to_string),
        present,
        missing,
        redirect_uri: query.get("redirect_uri").cloned(),
        error: query
            .get("error_description")
            .or_else(|| query.get("error"))
            .cloned(),
    }
}

/// `redirect_to` must be the callback URL plus this attempt's `state`.
fn carries_state(redirect_to: &str, callback_url: &str, flow_state: &str) -> bool {
    let Ok(url) = Url::parse(redirect_to) else {
        return false;
    };
    let mut base = url.clone();
    base.set_query(None);
    base.as_str() == callback_url
        && url
            .query_pairs()
            .any(|(key, value)| key == "state" && value == flow_state)
}

pub async fn oauth_report(state: &AppState) -> Value {
    let config = state.config();
    let callback_url = config.callback_url();
    let mut providers = Vec::new();
    let mut recommendations = Vec::new();

    for provider in config.providers() {
        let (entry, mut advice) = provider_report(state, *provider, &callback_url).await;
        providers.push(entry);
        recommendations.append(&mut advice);
    }

    recommendations.push(format!(
        "Make sure {callback_url}** is in the backend redirect URL allow-list: logins append ?state="
    ));

    json!({
        "success": true,
        "timestamp": timestamp(),
        "callback_url": callback_url,
        "providers": providers,
        "recommendations": recommendations,
    })
}

async fn provider_report(
    state: &AppState,
    provider: Provider,
    callback_url: &str,
) -> (Value, Vec<String>) {
    let name = provider.display_name();
    let flow = pkce::generate_code_verifier().and_then(|verifier| {
        pkce::generate_state().map(|flow_state| (flow_state, pkce::code_challenge(&verifier)))
    });
    let (flow_state, challenge) = match flow {
        Ok(flow) => flow,
        Err(err) => {
            return (
                json!({ "provider": provider, "error": err.to_string() }),
                vec![format!("{name}: could not generate a PKCE verifier")],
            );
        }
    };

    let url = match state
        .backend()
        .authorize_url(
            provider,
            &state.config().callback_url_with_state(&flow_state),
            &challenge,
        )
    {
        Ok(url) => url,
        Err(err) => {
            return (
                json!({ "provider": provider, "error": err.to_string() }),
                vec![format!("{name}: authorize URL could not be built")],
            );
        }
    };

    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    let checks = json!({
        "has_code_challenge": query.contains_key("code_challenge"),
        "code_challenge_method_s256": query.get("code_challenge_method").map(String::as_str) == Some("s256"),
        "has_redirect_to": query
            .get("redirect_to")
            .is_some_and(|redirect_to| carries_state(redirect_to, callback_url, &flow_state)),
    });

    let probe = state.backend().probe(Method::GET, &url).await;
    let analysis = probe.location.as_deref().map(analyze_location);

    let mut advice = Vec::new();
    match (&probe.status, &analysis) {
        (None, _) => advice.push(format!("{name}: authorize endpoint is unreachable")),
        (_, Some(analysis)) if analysis.looks_like_provider() => {}
        (_, Some(analysis)) => {
            if let Some(error) = &analysis.error {
                advice.push(format!("{name}: provider redirect reports an error: {error}"));
            }
            if !analysis.missing.is_empty() {
                advice.push(format!(
                    "{name}: provider redirect is missing {}; check the client ID and secret in the backend dashboard",
                    analysis.missing.join(", ")
                ));
            }
        }
        (Some(status), None) if *status == 400 || *status == 404 => advice.push(format!(
            "{name}: provider is probably not enabled; enable it under Authentication > Providers"
        )),
        (Some(status), None) => advice.push(format!(
            "{name}: authorize endpoint answered {status} without a redirect"
        )),
    }

    (
        json!({
            "provider": provider,
            "authorize_url": url.as_str(),
            "checks": checks,
            "probe": probe,
            "location_analysis": analysis,
        }),
        advice,
    )
}
