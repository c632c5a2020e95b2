//! Minimal server-rendered login page.

use super::auth::errors::{self, OAuthErrorGuidance};
use crate::{api::AppState, backend::Provider};
use axum::{
    extract::{Extension, Query},
    response::{Html, IntoResponse},
};
use serde::Deserialize;
use std::{fmt::Write, sync::Arc};

#[derive(Debug, Default, Deserialize)]
pub struct RootQuery {
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub async fn root(
    Query(query): Query<RootQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let guidance = query
        .error
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| errors::guidance(code, query.error_description.as_deref()));

    Html(render_page(state.config().providers(), guidance.as_ref()))
}

#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_page(providers: &[Provider], guidance: Option<&OAuthErrorGuidance>) -> String {
    let mut html = String::from(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>rugbot</title>\n</head>\n<body>\n<main>\n<h1>rugbot</h1>\n",
    );

    if let Some(guidance) = guidance {
        html.push_str(&render_error(guidance));
    }

    html.push_str("<p>Sign in to join the conversation.</p>\n<ul class=\"providers\">\n");
    for provider in providers {
        let _ = writeln!(
            html,
            "<li><a href=\"/auth/login/{}\">Continue with {}</a></li>",
            provider.as_str(),
            escape_html(provider.display_name())
        );
    }
    html.push_str("</ul>\n<p><a href=\"/v1/posts\">Community posts (JSON)</a></p>\n");
    html.push_str("</main>\n</body>\n</html>\n");
    html
}

fn render_error(guidance: &OAuthErrorGuidance) -> String {
    let mut panel = String::from("<section class=\"error\" role=\"alert\">\n");
    let _ = writeln!(panel, "<h2>{}</h2>", escape_html(guidance.title));
    let _ = writeln!(panel, "<p>{}</p>", escape_html(&guidance.description));
    let _ = writeln!(
        panel,
        "<p><small>Error code: <code>{}</code></small></p>",
        escape_html(&guidance.code)
    );
    panel.push_str("<h3>Troubleshooting</h3>\n<ol>\n");
    for step in &guidance.steps {
        let _ = writeln!(panel, "<li>{}</li>", escape_html(step));
    }
    panel.push_str("</ol>\n</section>\n");
    panel
}
