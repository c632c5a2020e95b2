use crate::backend::Provider;
use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};
use url::Url;

pub const ARG_SITE_URL: &str = "site-url";
pub const ARG_PROVIDERS: &str = "providers";
pub const ARG_DEBUG_ENDPOINTS: &str = "debug-endpoints";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SITE_URL)
                .long(ARG_SITE_URL)
                .help("Public URL of this service, used for OAuth redirects and cookie security")
                .env("RUGBOT_SITE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_PROVIDERS)
                .long(ARG_PROVIDERS)
                .help("Comma separated OAuth providers offered on the login page")
                .long_help("Comma separated OAuth providers offered on the login page. Supported: google, discord, twitter, github")
                .env("RUGBOT_PROVIDERS")
                .default_value("google,discord"),
        )
        .arg(
            Arg::new(ARG_DEBUG_ENDPOINTS)
                .long(ARG_DEBUG_ENDPOINTS)
                .help("Mount the /debug/* troubleshooting reports and /docs")
                .env("RUGBOT_DEBUG_ENDPOINTS")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug)]
pub struct Options {
    pub site_url: String,
    pub providers: Vec<Provider>,
    pub debug_endpoints: bool,
}

impl Options {
    /// # Errors
    /// Returns an error if the site URL is not an absolute http(s) URL or a provider is unknown.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let raw_site_url = matches
            .get_one::<String>(ARG_SITE_URL)
            .context("missing required argument: --site-url")?;
        let site_url = parse_site_url(raw_site_url)?;

        let providers = matches
            .get_one::<String>(ARG_PROVIDERS)
            .map_or(Ok(Vec::new()), |raw| parse_providers(raw))?;

        Ok(Self {
            site_url,
            providers,
            debug_endpoints: matches.get_flag(ARG_DEBUG_ENDPOINTS),
        })
    }
}

/// Origin plus optional path prefix, without a trailing slash.
///
/// # Errors
/// Returns an error for relative or non-http(s) URLs.
pub fn parse_site_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim()).with_context(|| format!("invalid site URL: {raw}"))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(anyhow!("site URL must be an absolute http(s) URL: {raw}"));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Parse and de-duplicate a comma separated provider list, keeping order.
///
/// # Errors
/// Returns an error naming the first unsupported provider.
pub fn parse_providers(raw: &str) -> Result<Vec<Provider>> {
    let mut providers = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let provider: Provider = name.parse().map_err(|err: String| anyhow!(err))?;
        if !providers.contains(&provider) {
            providers.push(provider);
        }
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_url_is_normalized() -> Result<()> {
        assert_eq!(
            parse_site_url("https://rugbot.dev/")?,
            "https://rugbot.dev"
        );
        assert_eq!(
            parse_site_url("http://localhost:3000")?,
            "http://localhost:3000"
        );
        assert!(parse_site_url("rugbot.dev").is_err());
        assert!(parse_site_url("ftp://rugbot.dev").is_err());
        Ok(())
    }

    #[test]
    fn providers_are_parsed_in_order_without_duplicates() -> Result<()> {
        assert_eq!(
            parse_providers("discord, google,discord,,")?,
            vec![Provider::Discord, Provider::Google]
        );
        assert!(parse_providers("")?.is_empty());
        let Err(err) = parse_providers("google,myspace") else {
            panic!("unknown provider must be rejected");
        };
        assert!(err.to_string().contains("myspace"));
        Ok(())
    }
}
