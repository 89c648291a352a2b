mod cli;

use crate::cli::CookieShieldArguments;
use anyhow::Result;
use clap::Parser;
use cookieshield::config::Config;
use cookieshield::proxy;
use log::{LevelFilter, info, trace};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CookieShieldArguments::parse();
    pretty_env_logger::env_logger::builder()
        .format_timestamp(None)
        .filter_level(if args.verbose { LevelFilter::Trace } else { LevelFilter::Info })
        .init();

    // Subcommands run and exit without starting the proxy
    if args.handle_arguments().await? {
        return Ok(());
    }

    info!("Starting cookieshield");
    trace!("Arguments: {:#?}", args);

    let config_path = Config::resolve_config_path(args.config_path.clone());
    let mut config = Config::try_load(&config_path).await?;
    config.apply_overrides(&args.overrides());
    config.validate()?;
    info!("Relaying to backend at {}", config.backend_addr());

    proxy::start_proxy_server(&config).await
}
