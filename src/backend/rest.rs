use super::{BackendClient, BackendError};
use chrono::{DateTime, Utc};
use reqwest::{Method, header::ACCEPT};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};
use utoipa::ToSchema;

const POSTS_TABLE: &str = "posts";
const PROFILES_TABLE: &str = "ai_user";

/// Author details denormalized onto each post at insert time.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
pub struct AuthorMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct Post {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub content: String,
    pub user_id: String,
    #[serde(default)]
    pub user_metadata: AuthorMetadata,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub user_id: String,
    pub user_metadata: AuthorMetadata,
}

// `id` is a bigint in some schemas and a uuid in others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[derive(Deserialize)]
struct RoleRow {
    role: Option<String>,
}

#[derive(Deserialize)]
struct ColumnRow {
    column_name: String,
}

impl BackendClient {
    /// Posts visible to the caller, newest first.
    ///
    /// # Errors
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip(self, access_token))]
    pub async fn list_posts(&self, access_token: &str) -> Result<Vec<Post>, BackendError> {
        let mut url = self.endpoint(&format!("/rest/v1/{POSTS_TABLE}"))?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");
        let request = self.user_request(Method::GET, url.clone(), access_token);
        self.send_json(request, &url).await
    }

    /// Insert as the caller so row-level security applies.
    ///
    /// # Errors
    /// Returns an error if the backend rejects the row or returns nothing.
    #[instrument(skip(self, access_token, post), fields(user_id = %post.user_id))]
    pub async fn insert_post(
        &self,
        access_token: &str,
        post: &NewPost,
    ) -> Result<Post, BackendError> {
        let url = self.endpoint(&format!("/rest/v1/{POSTS_TABLE}"))?;
        let request = self
            .user_request(Method::POST, url.clone(), access_token)
            .header("Prefer", "return=representation")
            .json(&[post]);
        let rows: Vec<Post> = self.send_json(request, &url).await?;

        let created = rows
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::EmptyResponse(url.path().to_string()))?;
        debug!(post_id = %created.id, "post created");
        Ok(created)
    }

    /// Role from the profile table, `None` when the profile row has no role.
    ///
    /// # Errors
    /// Returns an error if the secret key is missing, the lookup fails or the user has no
    /// profile row.
    #[instrument(skip(self))]
    pub async fn user_role(&self, user_id: &str) -> Result<Option<String>, BackendError> {
        let mut url = self.endpoint(&format!("/rest/v1/{PROFILES_TABLE}"))?;
        url.query_pairs_mut()
            .append_pair("select", "role")
            .append_pair("id", &format!("eq.{user_id}"));
        let request = self.service_request(Method::GET, url.clone())?;
        let rows: Vec<RoleRow> = self.send_json(request, &url).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::EmptyResponse(url.path().to_string()))?;
        Ok(row.role)
    }

    /// # Errors
    /// Returns an error if the secret key is missing or the request fails.
    #[instrument(skip(self))]
    pub async fn list_profiles(&self) -> Result<Vec<Value>, BackendError> {
        let mut url = self.endpoint(&format!("/rest/v1/{PROFILES_TABLE}"))?;
        url.query_pairs_mut().append_pair("select", "*");
        let request = self.service_request(Method::GET, url.clone())?;
        self.send_json(request, &url).await
    }

    /// Read at most one row to check that a table exists and is readable.
    ///
    /// # Errors
    /// Returns the backend error (`42P01` for a missing relation) if the table is not readable.
    #[instrument(skip(self))]
    pub async fn probe_table(&self, table: &str) -> Result<usize, BackendError> {
        let mut url = self.endpoint(&format!("/rest/v1/{table}"))?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("limit", "1");
        let request = self
            .best_effort_request(Method::GET, url.clone())
            .header(ACCEPT, "application/json");
        let rows: Vec<Value> = self.send_json(request, &url).await?;
        Ok(rows.len())
    }

    /// Column names via the `get_table_columns` RPC, which must be installed in the database.
    ///
    /// # Errors
    /// Returns an error if the function is missing or the call fails.
    #[instrument(skip(self))]
    pub async fn table_columns(&self, table: &str) -> Result<Vec<String>, BackendError> {
        let url = self.endpoint("/rest/v1/rpc/get_table_columns")?;
        let request = self
            .best_effort_request(Method::POST, url.clone())
            .json(&json!({ "table_name": table }));
        let rows: Vec<ColumnRow> = self.send_json(request, &url).await?;
        Ok(rows.into_iter().map(|row| row.column_name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::{can_bind_localhost, client_for};
    use anyhow::Result;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post_json(id: Value, title: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "content": "Hello there",
            "user_id": "u1",
            "user_metadata": {"full_name": "Ada Lovelace", "avatar_url": null, "user_name": "ada"},
            "created_at": "2025-03-01T12:00:00.123456+00:00",
            "updated_at": "2025-03-01T12:00:00.123456+00:00"
        })
    }

    #[test]
    fn post_id_accepts_numbers_and_strings() -> Result<()> {
        let post: Post = serde_json::from_value(post_json(json!(42), "numeric"))?;
        assert_eq!(post.id, "42");
        let post: Post = serde_json::from_value(post_json(json!("a-uuid"), "uuid"))?;
        assert_eq!(post.id, "a-uuid");
        assert!(serde_json::from_value::<Post>(post_json(json!(null), "bad")).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn list_posts_orders_newest_first_with_user_token() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/posts"))
            .and(query_param("select", "*"))
            .and(query_param("order", "created_at.desc"))
            .and(header("authorization", "Bearer access-1"))
            .and(header("apikey", "publishable-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                post_json(json!(2), "second"),
                post_json(json!(1), "first")
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let posts = client.list_posts("access-1").await?;
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "second");
        assert_eq!(posts[1].user_metadata.user_name.as_deref(), Some("ada"));
        Ok(())
    }

    #[tokio::test]
    async fn insert_post_returns_representation() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        let new_post = NewPost {
            title: "Hello".to_string(),
            content: "World".to_string(),
            user_id: "u1".to_string(),
            user_metadata: AuthorMetadata {
                full_name: Some("Ada Lovelace".to_string()),
                avatar_url: None,
                user_name: Some("ada".to_string()),
            },
        };
        Mock::given(method("POST"))
            .and(path("/rest/v1/posts"))
            .and(header("prefer", "return=representation"))
            .and(header("authorization", "Bearer access-1"))
            .and(body_json(json!([{
                "title": "Hello",
                "content": "World",
                "user_id": "u1",
                "user_metadata": {"full_name": "Ada Lovelace", "avatar_url": null, "user_name": "ada"}
            }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([post_json(
                json!(7),
                "Hello"
            )])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let post = client.insert_post("access-1", &new_post).await?;
        assert_eq!(post.id, "7");
        assert_eq!(post.title, "Hello");
        Ok(())
    }

    #[tokio::test]
    async fn insert_post_surfaces_rls_rejection() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/posts"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "code": "42501",
                "details": null,
                "hint": null,
                "message": "new row violates row-level security policy for table \"posts\""
            })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let new_post = NewPost {
            title: "t".to_string(),
            content: "c".to_string(),
            user_id: "u1".to_string(),
            user_metadata: AuthorMetadata::default(),
        };
        let Err(error) = client.insert_post("access-1", &new_post).await else {
            panic!("insert should be rejected");
        };
        assert_eq!(error.api().and_then(|api| api.code.as_deref()), Some("42501"));
        assert!(error.user_message().contains("row-level security"));
        Ok(())
    }

    #[tokio::test]
    async fn user_role_uses_secret_key() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/ai_user"))
            .and(query_param("select", "role"))
            .and(query_param("id", "eq.admin-1"))
            .and(header("apikey", "secret-key"))
            .and(header("authorization", "Bearer secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"role": "admin"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/ai_user"))
            .and(query_param("id", "eq.nobody"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/ai_user"))
            .and(query_param("id", "eq.roleless"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"role": null}])))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        assert_eq!(
            client.user_role("admin-1").await?.as_deref(),
            Some("admin")
        );
        assert_eq!(client.user_role("roleless").await?, None);
        assert!(matches!(
            client.user_role("nobody").await,
            Err(BackendError::EmptyResponse(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn table_columns_and_probe() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/get_table_columns"))
            .and(body_json(json!({"table_name": "posts"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"column_name": "id"},
                {"column_name": "title"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/posts"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "42P01",
                "message": "relation \"public.missing\" does not exist"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        assert_eq!(client.table_columns("posts").await?, vec!["id", "title"]);
        assert_eq!(client.probe_table("posts").await?, 1);
        let Err(error) = client.probe_table("missing").await else {
            panic!("missing table should fail");
        };
        assert_eq!(error.api().and_then(|api| api.code.as_deref()), Some("42P01"));
        Ok(())
    }
}
