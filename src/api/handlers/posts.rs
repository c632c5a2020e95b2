//! Community posts, stored in the backend `posts` table under the caller's token.

use super::{
    HandlerError,
    auth::{ResolvedSession, resolve_session},
};
use crate::{
    api::AppState,
    backend::{AuthorMetadata, NewPost, Post, User},
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

pub const TITLE_MAX_CHARS: usize = 100;
pub const CONTENT_MAX_CHARS: usize = 1000;

#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl CreatePostRequest {
    /// Trimmed `(title, content)`, or the message to show when they are unusable.
    pub fn validate(&self) -> Result<(&str, &str), &'static str> {
        let title = self.title.trim();
        let content = self.content.trim();
        if title.is_empty() || content.is_empty() {
            return Err("Please fill in both title and content");
        }
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err("Title must be 100 characters or less");
        }
        if content.chars().count() > CONTENT_MAX_CHARS {
            return Err("Content must be 1000 characters or less");
        }
        Ok((title, content))
    }
}

/// Author fields copied onto the post so the feed renders without a profile lookup.
#[must_use]
pub fn author_metadata(user: &User) -> AuthorMetadata {
    AuthorMetadata {
        full_name: user.display_name().map(str::to_string),
        avatar_url: user.metadata_str("avatar_url").map(str::to_string),
        user_name: user
            .metadata_str("user_name")
            .or_else(|| user.metadata_str("name"))
            .map(str::to_string),
    }
}

async fn require_session(
    state: &AppState,
    headers: &HeaderMap,
    unauthorized: &str,
) -> Result<ResolvedSession, HandlerError> {
    match resolve_session(state, headers).await {
        Ok(Some(resolved)) => Ok(resolved),
        Ok(None) => Err(HandlerError::unauthorized(unauthorized)),
        Err(err) => {
            error!("Failed to resolve session: {err}");
            Err(HandlerError::bad_gateway("Failed to verify session"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/posts",
    responses(
        (status = 200, description = "Posts, newest first", body = [Post]),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 502, description = "Backend unavailable", body = super::ErrorBody)
    ),
    tag = "posts"
)]
pub async fn list_posts(headers: HeaderMap, Extension(state): Extension<Arc<AppState>>) -> Response {
    let resolved =
        match require_session(&state, &headers, "You must be logged in to view posts").await {
            Ok(resolved) => resolved,
            Err(err) => return err.into_response(),
        };
    let cookie_headers = resolved.cookie_headers(&state);

    match state.backend().list_posts(&resolved.access_token).await {
        Ok(posts) => (StatusCode::OK, cookie_headers, Json(posts)).into_response(),
        Err(err) => {
            error!("Failed to list posts: {err}");
            let status = err.status().map_or(StatusCode::BAD_GATEWAY, |_| {
                StatusCode::INTERNAL_SERVER_ERROR
            });
            (
                cookie_headers,
                HandlerError::new(status, "Failed to load posts").with_details(err.user_message()),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Missing or oversized title/content", body = super::ErrorBody),
        (status = 401, description = "No active session", body = super::ErrorBody),
        (status = 500, description = "Backend rejected the post", body = super::ErrorBody)
    ),
    tag = "posts"
)]
pub async fn create_post(
    headers: HeaderMap,
    Extension(state): Extension<Arc<AppState>>,
    payload: Option<Json<CreatePostRequest>>,
) -> Response {
    let resolved =
        match require_session(&state, &headers, "You must be logged in to create a post").await {
            Ok(resolved) => resolved,
            Err(err) => return err.into_response(),
        };
    let cookie_headers = resolved.cookie_headers(&state);

    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let (title, content) = match request.validate() {
        Ok(fields) => fields,
        Err(message) => {
            return (cookie_headers, HandlerError::bad_request(message)).into_response();
        }
    };

    let post = NewPost {
        title: title.to_string(),
        content: content.to_string(),
        user_id: resolved.user.id.clone(),
        user_metadata: author_metadata(&resolved.user),
    };

    match state
        .backend()
        .insert_post(&resolved.access_token, &post)
        .await
    {
        Ok(created) => {
            info!(post_id = %created.id, user_id = %created.user_id, "post created");
            (StatusCode::CREATED, cookie_headers, Json(created)).into_response()
        }
        Err(err) => {
            error!("Failed to create post: {err}");
            (
                cookie_headers,
                HandlerError::internal(format!("Failed to create post: {}", err.user_message())),
            )
                .into_response()
        }
    }
}
