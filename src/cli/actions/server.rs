use crate::{
    api::{self, SiteConfig},
    backend::{Provider, redact_key},
    cli::globals::GlobalArgs,
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend_url: String,
    pub publishable_key: SecretString,
    pub secret_key: Option<SecretString>,
    pub site_url: String,
    pub providers: Vec<Provider>,
    pub debug_endpoints: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the backend URL is unusable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let mut globals = GlobalArgs::new(args.backend_url, args.publishable_key);
    if let Some(secret_key) = args.secret_key {
        globals.set_secret_key(secret_key);
    }

    debug!("Global args: {:?}", globals);

    let config = SiteConfig::new(args.site_url)
        .with_providers(args.providers)
        .with_debug_endpoints(args.debug_endpoints);

    api::new(args.port, &globals, config).await
}

fn log_startup_args(args: &Args) {
    info!(
        "{}",
        startup_message("Startup configuration", &startup_entries(args))
    );
}

fn startup_entries(args: &Args) -> [(&'static str, String); 7] {
    let providers = args
        .providers
        .iter()
        .map(|provider| provider.as_str())
        .collect::<Vec<_>>()
        .join(",");
    [
        ("listen", format!("tcp:{}", args.port)),
        ("backend_url", args.backend_url.clone()),
        ("publishable_key", redact_key(&args.publishable_key)),
        (
            "secret_key",
            args.secret_key
                .as_ref()
                .map_or_else(|| "not set".to_string(), redact_key),
        ),
        ("site_url", args.site_url.clone()),
        (
            "providers",
            if providers.is_empty() {
                "none".to_string()
            } else {
                providers
            },
        ),
        ("debug_endpoints", args.debug_endpoints.to_string()),
    ]
}

fn startup_message(title: &str, entries: &[(&str, String)]) -> String {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", rugbot_banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    message
}

fn rugbot_banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    RUGBOT_BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

const RUGBOT_BANNER: &str = r"
   _________
  |  _   _  |
  | |_| |_| |
  |    ^    |   R U G B O T {VERSION}
  |  \___/  |
  |_________|";
