use super::{HandlerError, auth::cookies::extract_bearer_token};
use crate::api::AppState;
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminUsersResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Value>,
    pub count: usize,
}

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    responses(
        (status = 200, description = "All user profiles", body = AdminUsersResponse),
        (status = 401, description = "Missing, invalid or expired bearer token", body = super::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = super::ErrorBody),
        (status = 500, description = "Profiles could not be loaded", body = super::ErrorBody)
    ),
    tag = "admin"
)]
pub async fn list_users(headers: HeaderMap, Extension(state): Extension<Arc<AppState>>) -> Response {
    match admin_users(&state, &headers).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn admin_users(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AdminUsersResponse, HandlerError> {
    let token = extract_bearer_token(headers).ok_or_else(|| {
        HandlerError::unauthorized("Unauthorized - Missing or invalid authorization header")
    })?;

    let user = state.backend().get_user(&token).await.map_err(|err| {
        info!("Admin token rejected: {err}");
        HandlerError::unauthorized("Invalid or expired token")
    })?;

    let role = state.backend().user_role(&user.id).await.map_err(|err| {
        error!(user_id = %user.id, "Failed to look up role: {err}");
        HandlerError::forbidden("Forbidden - Unable to verify permissions")
    })?;

    if role.as_deref() != Some(ADMIN_ROLE) {
        warn!(
            user_id = %user.id,
            role = role.as_deref().unwrap_or("none"),
            "Non-admin attempted to list users"
        );
        return Err(HandlerError::forbidden("Forbidden - Admin access required"));
    }

    let data = state.backend().list_profiles().await.map_err(|err| {
        error!("Failed to list profiles: {err}");
        HandlerError::internal("Failed to retrieve data")
    })?;

    Ok(AdminUsersResponse {
        success: true,
        count: data.len(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::tests::{state_for, user_json};
    use crate::backend::tests::can_bind_localhost;
    use anyhow::Result;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::Request,
        routing::get,
    };
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/v1/admin/users", get(list_users))
            .layer(Extension(Arc::new(state)))
    }

    fn request(authorization: Option<&str>) -> Result<Request<Body>> {
        let mut builder = Request::builder().uri("/v1/admin/users");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        Ok(builder.body(Body::empty())?)
    }

    async fn error_of(response: Response) -> Result<(StatusCode, String)> {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let payload: Value = serde_json::from_slice(&body)?;
        Ok((status, payload["error"].as_str().unwrap_or_default().to_string()))
    }

    async fn server_with_role(role: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u1")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer bad"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "bad jwt"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/ai_user"))
            .and(query_param("select", "role"))
            .and(query_param("id", "eq.u1"))
            .and(header("authorization", "Bearer secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(role))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() -> Result<()> {
        for authorization in [None, Some("Basic abc"), Some("Bearer ")] {
            let response = app(state_for("http://127.0.0.1:9"))
                .oneshot(request(authorization)?)
                .await?;
            assert_eq!(
                error_of(response).await?,
                (
                    StatusCode::UNAUTHORIZED,
                    "Unauthorized - Missing or invalid authorization header".to_string()
                )
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn rejected_token_is_unauthorized() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = server_with_role(json!([])).await;
        let response = app(state_for(&server.uri()))
            .oneshot(request(Some("Bearer bad"))?)
            .await?;
        assert_eq!(
            error_of(response).await?,
            (StatusCode::UNAUTHORIZED, "Invalid or expired token".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn non_admin_is_forbidden() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        for rows in [json!([{"role": "user"}]), json!([{"role": null}])] {
            let server = server_with_role(rows).await;
            let response = app(state_for(&server.uri()))
                .oneshot(request(Some("Bearer good"))?)
                .await?;
            assert_eq!(
                error_of(response).await?,
                (
                    StatusCode::FORBIDDEN,
                    "Forbidden - Admin access required".to_string()
                )
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn missing_profile_row_cannot_be_verified() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = server_with_role(json!([])).await;
        let response = app(state_for(&server.uri()))
            .oneshot(request(Some("Bearer good"))?)
            .await?;
        assert_eq!(
            error_of(response).await?,
            (
                StatusCode::FORBIDDEN,
                "Forbidden - Unable to verify permissions".to_string()
            )
        );
        Ok(())
    }

    #[tokio::test]
    async fn role_lookup_failure_is_forbidden() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json("u1")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/ai_user"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .mount(&server)
            .await;

        let response = app(state_for(&server.uri()))
            .oneshot(request(Some("Bearer good"))?)
            .await?;
        assert_eq!(
            error_of(response).await?,
            (
                StatusCode::FORBIDDEN,
                "Forbidden - Unable to verify permissions".to_string()
            )
        );
        Ok(())
    }

    #[tokio::test]
    async fn admin_gets_all_profiles() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = server_with_role(json!([{"role": "admin"}])).await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/ai_user"))
            .and(query_param("select", "*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "u1", "role": "admin"},
                {"id": "u2", "role": "user"}
            ])))
            .mount(&server)
            .await;

        let response = app(state_for(&server.uri()))
            .oneshot(request(Some("Bearer good"))?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let payload: Value = serde_json::from_slice(&body)?;
        assert_eq!(payload["success"], true);
        assert_eq!(payload["count"], 2);
        assert_eq!(payload["data"][1]["id"], "u2");
        Ok(())
    }

    #[tokio::test]
    async fn profile_failure_is_internal_error() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = server_with_role(json!([{"role": "admin"}])).await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/ai_user"))
            .and(query_param("select", "*"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let response = app(state_for(&server.uri()))
            .oneshot(request(Some("Bearer good"))?)
            .await?;
        assert_eq!(
            error_of(response).await?,
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve data".to_string()
            )
        );
        Ok(())
    }
}
