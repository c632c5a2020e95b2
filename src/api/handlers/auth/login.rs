use super::cookies::{self, FlowCookie};
use crate::{
    api::{AppState, handlers::HandlerError},
    backend::{Provider, pkce},
};
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{error, info};

/// Start an OAuth login: remember state + verifier in a cookie, then redirect to the provider.
pub async fn login(
    Path(provider): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let provider = match provider.parse::<Provider>() {
        Ok(provider) if state.config().provider_enabled(provider) => provider,
        _ => {
            return HandlerError::new(StatusCode::NOT_FOUND, "Unsupported provider")
                .with_details(provider)
                .into_response();
        }
    };

    match start_login(&state, provider) {
        Ok(response) => response,
        Err(err) => {
            error!("Failed to start {provider} login: {err:#}");
            HandlerError::internal("Failed to start login").into_response()
        }
    }
}

fn start_login(state: &AppState, provider: Provider) -> anyhow::Result<Response> {
    let flow = FlowCookie {
        state: pkce::generate_state()?,
        verifier: pkce::generate_code_verifier()?,
    };
    let challenge = pkce::code_challenge(&flow.verifier);
    let redirect_to = state.config().callback_url_with_state(&flow.state);
    let authorize_url = state
        .backend()
        .authorize_url(provider, &redirect_to, &challenge)?;

    let mut headers = HeaderMap::new();
    cookies::append_cookies(
        &mut headers,
        [cookies::flow_cookie(state.config(), &flow)],
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    info!(provider = %provider, "redirecting to provider login");
    Ok((headers, Redirect::to(authorize_url.as_str())).into_response())
}
