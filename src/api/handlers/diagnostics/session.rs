use super::timestamp;
use crate::api::{
    AppState,
    handlers::auth::{cookies, resolve_session},
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{Value, json};
use std::sync::Arc;

pub async fn session(headers: HeaderMap, Extension(state): Extension<Arc<AppState>>) -> Response {
    let has_bearer = cookies::extract_bearer_token(&headers).is_some();
    let has_access_cookie = cookies::read_cookie(&headers, cookies::ACCESS_TOKEN_COOKIE).is_some();
    let has_refresh_cookie =
        cookies::read_cookie(&headers, cookies::REFRESH_TOKEN_COOKIE).is_some();
    let has_flow_cookie = cookies::read_cookie(&headers, cookies::OAUTH_FLOW_COOKIE).is_some();

    let mut recommendations = Vec::new();
    let mut cookie_headers = HeaderMap::new();

    let session = match resolve_session(&state, &headers).await {
        Ok(Some(resolved)) => {
            // A refresh rotates the token, so the new pair must reach the browser.
            cookie_headers = resolved.cookie_headers(&state);
            let user = &resolved.user;
            json!({
                "active": true,
                "refreshed": resolved.refreshed.is_some(),
                "user": {
                    "id": user.id,
                    "email": user.email,
                    "display_name": user.display_name(),
                    "provider": user.app_metadata.get("provider"),
                    "created_at": user.created_at,
                },
            })
        }
        Ok(None) => {
            if has_access_cookie || has_bearer || has_refresh_cookie {
                recommendations
                    .push("Stored tokens were rejected: sign in again".to_string());
            } else {
                recommendations.push("No session: sign in from the home page".to_string());
            }
            json!({ "active": false })
        }
        Err(err) => {
            recommendations.push("Auth server could not be reached".to_string());
            json!({ "active": false, "error": err.to_string() })
        }
    };

    if has_flow_cookie {
        recommendations.push(
            "A login is still in progress: the callback never completed or was opened in another browser"
                .to_string(),
        );
    }

    let report: Value = json!({
        "success": true,
        "timestamp": timestamp(),
        "credentials": {
            "bearer": has_bearer,
            "access_cookie": has_access_cookie,
            "refresh_cookie": has_refresh_cookie,
            "flow_cookie": has_flow_cookie,
        },
        "session": session,
        "recommendations": recommendations,
    });

    (StatusCode::OK, cookie_headers, Json(report)).into_response()
}
