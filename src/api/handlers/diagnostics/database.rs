use super::timestamp;
use crate::api::AppState;
use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use serde_json::{Value, json};
use std::sync::Arc;

const POSTS_TABLE: &str = "posts";

/// Columns the posts feature reads or writes.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "id",
    "title",
    "content",
    "user_id",
    "user_metadata",
    "created_at",
    "updated_at",
];

pub async fn database(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(database_report(&state).await)
}

pub async fn database_report(state: &AppState) -> Value {
    let backend = state.backend();
    let mut recommendations = Vec::new();

    let table = match backend.probe_table(POSTS_TABLE).await {
        Ok(rows) => json!({ "accessible": true, "sample_rows": rows }),
        Err(err) => {
            let code = err.api().and_then(|api| api.code.clone());
            let hint = match code.as_deref() {
                Some("42P01" | "PGRST116" | "PGRST205") => {
                    Some("The posts table does not exist: create it before using the posts API")
                }
                _ => None,
            };
            recommendations.push(
                hint.map_or_else(|| format!("posts table is not readable: {}", err.user_message()), str::to_string),
            );
            json!({
                "accessible": false,
                "error": err.user_message(),
                "code": code,
                "hint": hint,
            })
        }
    };

    let columns = match backend.table_columns(POSTS_TABLE).await {
        Ok(existing) => {
            let missing: Vec<&str> = REQUIRED_COLUMNS
                .into_iter()
                .filter(|column| !existing.iter().any(|name| name == column))
                .collect();
            if missing.is_empty() {
                recommendations.push("All required columns are present".to_string());
            } else {
                recommendations.push(format!("Add the missing columns: {}", missing.join(", ")));
            }
            json!({
                "available": true,
                "existing": existing,
                "missing": missing,
                "required": REQUIRED_COLUMNS,
            })
        }
        Err(err) => json!({
            "available": false,
            "error": err.user_message(),
            "hint": "Install the get_table_columns function to enable the column check",
            "required": REQUIRED_COLUMNS,
        }),
    };

    json!({
        "success": table["accessible"] == true,
        "timestamp": timestamp(),
        "table": table,
        "columns": columns,
        "recommendations": recommendations,
    })
}
