//! PKCE (RFC 7636) helpers for the authorization-code flow.
//!
//! The verifier stays on our side (in the login flow cookie); only the S256 challenge is sent
//! to the authorize endpoint. The verifier is presented again when exchanging the code.

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};

fn random_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate random bytes")?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// 32 random bytes, base64url without padding (43 characters).
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_code_verifier() -> Result<String> {
    random_token().context("failed to generate PKCE code verifier")
}

/// Opaque value binding a login attempt to the browser that started it.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_state() -> Result<String> {
    random_token().context("failed to generate OAuth state")
}

/// S256 challenge: `base64url(SHA-256(verifier))`, no padding.
#[must_use]
pub fn code_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// A verifier must be 43..=128 characters from the unreserved set.
#[must_use]
pub fn valid_code_verifier(code_verifier: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9\-._~]{43,128}$").is_ok_and(|re| re.is_match(code_verifier))
}
