use super::timestamp;
use crate::{api::AppState, backend::Probe};
use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use reqwest::Method;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// Backend paths probed with `HEAD`.
pub const PROBE_PATHS: [&str; 6] = [
    "/",
    "/auth/v1/health",
    "/auth/v1/authorize",
    "/auth/v1/token",
    "/auth/v1/user",
    "/rest/v1/",
];

// These only accept the real OAuth/grant requests.
const OAUTH_PATHS: [&str; 2] = ["/auth/v1/authorize", "/auth/v1/token"];

pub async fn connectivity(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(connectivity_report(&state).await)
}

pub async fn connectivity_report(state: &AppState) -> Value {
    let backend = state.backend();
    let mut probes = Vec::with_capacity(PROBE_PATHS.len());
    for path in PROBE_PATHS {
        let probe = match backend.endpoint(path) {
            Ok(url) => backend.probe(Method::HEAD, &url).await,
            Err(err) => Probe {
                url: format!("{}{path}", backend.base_url()),
                status: None,
                ok: false,
                status_text: None,
                location: None,
                error: Some(err.to_string()),
            },
        };
        debug!(path, status = ?probe.status, "probed backend");
        probes.push((path, probe));
    }

    let reachable = probes.iter().any(|(_, probe)| probe.status.is_some());
    let oauth_405 = probes
        .iter()
        .any(|(path, probe)| OAUTH_PATHS.contains(path) && probe.status == Some(405));

    let mut recommendations = Vec::new();
    if !reachable {
        recommendations.push("Backend is unreachable: check the backend URL and network".to_string());
    }
    if oauth_405 {
        recommendations.push(
            "405 on OAuth endpoints is expected: they only accept real OAuth requests".to_string(),
        );
    }

    let results: Vec<Value> = probes
        .into_iter()
        .map(|(path, probe)| json!({ "path": path, "probe": probe }))
        .collect();

    json!({
        "success": reachable,
        "timestamp": timestamp(),
        "backend_url": backend.base_url(),
        "results": results,
        "recommendations": recommendations,
    })
}
