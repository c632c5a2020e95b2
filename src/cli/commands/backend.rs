use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_PUBLISHABLE_KEY: &str = "publishable-key";
pub const ARG_SECRET_KEY: &str = "secret-key";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .long(ARG_BACKEND_URL)
                .help("Backend project URL, e.g. https://<project>.supabase.co")
                .env("RUGBOT_BACKEND_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PUBLISHABLE_KEY)
                .long(ARG_PUBLISHABLE_KEY)
                .help("Publishable (anon) API key")
                .env("RUGBOT_PUBLISHABLE_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SECRET_KEY)
                .long(ARG_SECRET_KEY)
                .help("Secret (service role) key, needed for the admin and database reports")
                .env("RUGBOT_SECRET_KEY")
                .hide_env_values(true),
        )
}

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub publishable_key: SecretString,
    pub secret_key: Option<SecretString>,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing or empty.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let url = matches
            .get_one::<String>(ARG_BACKEND_URL)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .context("missing required argument: --backend-url")?;

        let publishable_key = matches
            .get_one::<String>(ARG_PUBLISHABLE_KEY)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .context("missing required argument: --publishable-key")?;

        let secret_key = matches
            .get_one::<String>(ARG_SECRET_KEY)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(SecretString::from);

        Ok(Self {
            url,
            publishable_key: SecretString::from(publishable_key),
            secret_key,
        })
    }
}
