//! Map validated CLI arguments to an action.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, backend, site};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing, the site URL is invalid, or a provider
/// is not supported.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let backend_opts = backend::Options::parse(matches)?;
    let site_opts = site::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        backend_url: backend_opts.url,
        publishable_key: backend_opts.publishable_key,
        secret_key: backend_opts.secret_key,
        site_url: site_opts.site_url,
        providers: site_opts.providers,
        debug_endpoints: site_opts.debug_endpoints,
    }))
}
