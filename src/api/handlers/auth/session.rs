//! Session endpoints for cookie and bearer auth.

use super::{clear_auth_cookies, cookies, resolve_session};
use crate::{
    api::{AppState, handlers::HandlerError},
    backend::User,
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, warn};

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = User),
        (status = 204, description = "No active session"),
        (status = 502, description = "Auth server unavailable", body = crate::api::handlers::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, Extension(state): Extension<Arc<AppState>>) -> Response {
    match resolve_session(&state, &headers).await {
        Ok(Some(resolved)) => {
            let cookie_headers = resolved.cookie_headers(&state);
            (StatusCode::OK, cookie_headers, Json(resolved.user)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to resolve session: {err}");
            HandlerError::bad_gateway("Failed to verify session").into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, Extension(state): Extension<Arc<AppState>>) -> Response {
    if let Some(token) = cookies::extract_access_token(&headers)
        && let Err(err) = state.backend().sign_out(&token).await
    {
        warn!("Backend sign-out failed: {err}");
    }

    // Always clear the cookies, even if the backend no longer knows the session.
    (StatusCode::NO_CONTENT, clear_auth_cookies(&state)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::tests::{session_json, state_for, user_json};
    use crate::backend::tests::can_bind_localhost;
    use anyhow::Result;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::Request,
        routing::{get, post},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/v1/auth/session", get(session))
            .route("/v1/auth/logout", post(logout))
            .layer(Extension(Arc::new(state)))
    }

    #[tokio::test]
    async fn no_cookie_is_no_content() -> Result<()> {
        let response = app(state_for("http://127.0.0.1:9"))
            .oneshot(Request::builder().uri("/v1/auth/session").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        Ok(())
    }

    #[tokio::test]
    async fn bearer_token_returns_user() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u1")))
            .mount(&server)
            .await;

        let response = app(state_for(&server.uri()))
            .oneshot(
                Request::builder()
                    .uri("/v1/auth/session")
                    .header("authorization", "Bearer access-1")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("set-cookie").is_none());
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let payload: Value = serde_json::from_slice(&body)?;
        assert_eq!(payload["id"], "u1");
        assert_eq!(payload["email"], "ada@example.com");
        Ok(())
    }

    #[tokio::test]
    async fn refresh_cookie_alone_restores_session() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(session_json("access-9", "refresh-9")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = app(state_for(&server.uri()))
            .oneshot(
                Request::builder()
                    .uri("/v1/auth/session")
                    .header("cookie", "rugbot_refresh_token=refresh-8")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get_all("set-cookie").iter().count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_backend_is_bad_gateway() -> Result<()> {
        let response = app(state_for("http://127.0.0.1:9"))
            .oneshot(
                Request::builder()
                    .uri("/v1/auth/session")
                    .header("cookie", "rugbot_access_token=access-1")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_cookies_even_when_sign_out_fails() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "code": 401, "msg": "invalid JWT"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = app(state_for(&server.uri()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/auth/logout")
                    .header("cookie", "rugbot_access_token=stale")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cleared: Vec<_> = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert_eq!(cleared.len(), 3);
        assert!(cleared.iter().all(|cookie| cookie.contains("Max-Age=0")));
        Ok(())
    }
}
