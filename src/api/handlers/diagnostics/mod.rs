//! Troubleshooting reports for OAuth and backend misconfiguration.
//!
//! Mounted under `/debug` only when the server runs with `--debug-endpoints`. None of these
//! routes are part of the `OpenAPI` document. Keys are only ever shown redacted.

pub mod connectivity;
pub mod database;
pub mod env;
pub mod oauth;
pub mod session;

use axum::{Router, routing::get};

/// Routes for `/debug/*`.
pub fn router() -> Router {
    Router::new()
        .route("/debug/env", get(env::env))
        .route("/debug/connectivity", get(connectivity::connectivity))
        .route("/debug/oauth", get(oauth::oauth))
        .route("/debug/database", get(database::database))
        .route("/debug/session", get(session::session))
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
