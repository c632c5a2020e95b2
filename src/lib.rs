//! # Rugbot (social login & community posts)
//!
//! `rugbot` is a thin HTTP service in front of a hosted auth/database backend
//! (a `GoTrue` auth server plus a `PostgREST` database API). It owns three things:
//!
//! 1. **OAuth login:** the `/auth/login/{provider}` and `/auth/callback` routes run the
//!    authorization-code flow with **PKCE**. The code verifier is generated here, kept in a
//!    short-lived `HttpOnly` cookie, and used server-side to exchange the code for a session.
//! 2. **Session cookies:** access and refresh tokens live in `HttpOnly` cookies. Expired
//!    access tokens are refreshed once per request when a refresh token is present.
//! 3. **Community posts:** signed-in users can list and create posts. Inserts run with the
//!    caller's access token, so the backend's row-level security decides what is allowed.
//!
//! ## Diagnostics
//!
//! When started with `--debug-endpoints`, a small set of `/debug/*` reports dump the
//! configuration (with keys redacted to a prefix), probe backend endpoints, and analyze the
//! generated OAuth URLs. These exist to troubleshoot provider misconfiguration and are off by
//! default.

pub mod api;
pub mod backend;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
