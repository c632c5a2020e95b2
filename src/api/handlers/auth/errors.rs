//! User-facing guidance for OAuth errors reported back through `?error=`.

use serde::Serialize;

pub const EXCHANGE_FAILED: &str = "exchange_failed";
pub const ACCESS_DENIED: &str = "access_denied";
pub const INVALID_REQUEST: &str = "invalid_request";
pub const SERVER_ERROR: &str = "server_error";

const GENERIC_STEPS: [&str; 4] = [
    "Refresh the page and try again",
    "Clear your browser cache and cookies",
    "Check if you have a stable internet connection",
    "Contact support if the issue persists",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OAuthErrorGuidance {
    pub code: String,
    pub title: &'static str,
    pub description: String,
    pub steps: Vec<&'static str>,
}

#[must_use]
pub fn title(code: &str) -> &'static str {
    match code {
        EXCHANGE_FAILED => "Authentication Failed",
        ACCESS_DENIED => "Access Denied",
        INVALID_REQUEST => "Invalid Request",
        SERVER_ERROR => "Server Error",
        _ => "Authentication Error",
    }
}

fn default_description(code: &str) -> &'static str {
    match code {
        EXCHANGE_FAILED => {
            "Failed to complete the authentication process. This might be due to a configuration issue or network problem."
        }
        ACCESS_DENIED => {
            "You denied access to your account. Please try again and grant the necessary permissions."
        }
        INVALID_REQUEST => "The authentication request was invalid. Please try again.",
        SERVER_ERROR => "A server error occurred during authentication. Please try again later.",
        _ => "An unexpected error occurred during authentication.",
    }
}

#[must_use]
pub fn troubleshooting_steps(code: &str) -> Vec<&'static str> {
    match code {
        EXCHANGE_FAILED => vec![
            "Check that the backend project is reachable and correctly configured",
            "Verify that the OAuth provider is enabled in the backend dashboard",
            "Ensure the callback URL is allowed in both the backend and the provider settings",
            "Start a new sign-in from this page; login links expire after 10 minutes",
        ],
        ACCESS_DENIED => vec![
            "Make sure you grant the necessary permissions when prompted",
            "Check if your account has the required access level",
            "Try signing in with a different account if available",
        ],
        _ => GENERIC_STEPS.to_vec(),
    }
}

/// Guidance for an error code. A non-blank `description` replaces the default text.
#[must_use]
pub fn guidance(code: &str, description: Option<&str>) -> OAuthErrorGuidance {
    let description = description
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map_or_else(|| default_description(code).to_string(), str::to_string);

    OAuthErrorGuidance {
        code: code.to_string(),
        title: title(code),
        description,
        steps: troubleshooting_steps(code),
    }
}
