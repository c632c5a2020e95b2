use crate::backend::BackendClient;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Backend connection settings shared by the server and the diagnostics reports.
#[derive(Clone)]
pub struct GlobalArgs {
    pub backend_url: String,
    pub publishable_key: SecretString,
    pub secret_key: Option<SecretString>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(backend_url: String, publishable_key: SecretString) -> Self {
        Self {
            backend_url,
            publishable_key,
            secret_key: None,
        }
    }

    pub fn set_secret_key(&mut self, secret_key: SecretString) {
        self.secret_key = Some(secret_key);
    }

    /// # Errors
    /// Returns an error if the backend URL is not usable.
    pub fn backend_client(&self) -> Result<BackendClient> {
        BackendClient::new(
            &self.backend_url,
            self.publishable_key.clone(),
            self.secret_key.clone(),
        )
        .with_context(|| format!("invalid backend URL: {}", self.backend_url))
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("backend_url", &self.backend_url)
            .field("publishable_key", &"***")
            .field(
                "secret_key",
                &self.secret_key.as_ref().map(|_| "***"),
            )
            .finish()
    }
}
