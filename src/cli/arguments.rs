use cookieshield::config::{Config, ConfigOverrides};
use cookieshield::proxy::cookie::CookieMatch;
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

#[derive(Parser, Debug, Clone)]
#[command(name = "cookieshield", about, author, version, long_about = None, propagate_version = true)]
pub struct CookieShieldArguments {
    #[arg(short = 'c', long = "config", help = "Path to the configuration file")]
    pub(crate) config_path: Option<String>,
    #[arg(short = 'v', long = "verbose", help = "Enable verbose logging")]
    pub(crate) verbose: bool,
    #[arg(long = "listen-host", help = "Interface to listen on (default 0.0.0.0)")]
    pub(crate) listen_host: Option<String>,
    #[arg(short = 'l', long = "listen-port", help = "Port to accept client connections on (default 9001)")]
    pub(crate) listen_port: Option<u16>,
    #[arg(short = 'j', long = "backend-host", help = "Backend host to relay to (default localhost)")]
    pub(crate) backend_host: Option<String>,
    #[arg(short = 'P', long = "backend-port", help = "Backend port to relay to (default 9000)")]
    pub(crate) backend_port: Option<u16>,
    #[arg(short = 'W', long = "workers", help = "Number of connections relayed at once (default 10)")]
    pub(crate) workers: Option<usize>,
    #[arg(long = "cookie-match", value_enum, help = "How an existing Secure flag is detected")]
    pub(crate) cookie_match: Option<CookieMatchArg>,
    #[command(subcommand)]
    pub(crate) command: Option<CookieShieldCommands>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieMatchArg {
    /// "secure" anywhere in the header line
    Substring,
    /// A Secure attribute between semicolons
    Attribute,
}

impl From<CookieMatchArg> for CookieMatch {
    fn from(arg: CookieMatchArg) -> Self {
        match arg {
            CookieMatchArg::Substring => CookieMatch::Substring,
            CookieMatchArg::Attribute => CookieMatch::Attribute,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CookieShieldCommands {
    #[clap(name = "config", about = "Manage the configuration file")]
    Config {
        #[clap(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    #[clap(name = "show", about = "Show the effective configuration")]
    Show,
    #[clap(name = "show-path", about = "Show the path to the configuration file")]
    ShowPath,
    #[clap(name = "init", about = "Write a configuration file with the default values")]
    Init,
}

impl CookieShieldArguments {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen_host: self.listen_host.clone(),
            listen_port: self.listen_port,
            backend_host: self.backend_host.clone(),
            backend_port: self.backend_port,
            workers: self.workers,
            cookie_match: self.cookie_match.map(CookieMatch::from),
        }
    }

    /// Run a subcommand if one was given. Returns true when the process should exit afterwards.
    pub async fn handle_arguments(&self) -> Result<bool> {
        let Some(command) = &self.command else {
            return Ok(false);
        };
        let config_path = Config::resolve_config_path(self.config_path.clone());
        match command {
            CookieShieldCommands::Config { command } => match command {
                ConfigCommands::Show => {
                    let mut config = Config::try_load(&config_path).await?;
                    config.apply_overrides(&self.overrides());
                    println!("{}", config);
                }
                ConfigCommands::ShowPath => {
                    println!("{}", config_path);
                }
                ConfigCommands::Init => {
                    if std::path::Path::new(&config_path).exists() {
                        return Err(anyhow!("Configuration file {} already exists, not overwriting it", config_path));
                    }
                    Config::save_default(&config_path).await?;
                    info!("Wrote default configuration to {}", config_path);
                }
            },
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_arguments() {
        let args = CookieShieldArguments::parse_from(["cookieshield"]);
        assert!(args.config_path.is_none());
        assert!(!args.verbose);
        assert!(args.command.is_none());

        let overrides = args.overrides();
        assert!(overrides.listen_port.is_none());
        assert!(overrides.backend_host.is_none());
        assert!(overrides.cookie_match.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let args = CookieShieldArguments::parse_from([
            "cookieshield",
            "-c",
            "/etc/cookieshield.json",
            "-v",
            "-l",
            "8443",
            "-j",
            "authentik-server",
            "-P",
            "9100",
            "-W",
            "25",
            "--cookie-match",
            "attribute",
        ]);
        assert_eq!(args.config_path.as_deref(), Some("/etc/cookieshield.json"));
        assert!(args.verbose);

        let mut config = Config::default();
        config.apply_overrides(&args.overrides());
        assert_eq!(config.listen_addr(), "0.0.0.0:8443");
        assert_eq!(config.backend_addr(), "authentik-server:9100");
        assert_eq!(config.get_workers(), 25);
        assert_eq!(config.get_cookie_match(), CookieMatch::Attribute);
    }

    #[test]
    fn test_parse_config_subcommands() {
        let args = CookieShieldArguments::parse_from(["cookieshield", "config", "show"]);
        assert!(matches!(args.command, Some(CookieShieldCommands::Config { command: ConfigCommands::Show })));

        let args = CookieShieldArguments::parse_from(["cookieshield", "config", "show-path"]);
        assert!(matches!(args.command, Some(CookieShieldCommands::Config { command: ConfigCommands::ShowPath })));

        let args = CookieShieldArguments::parse_from(["cookieshield", "config", "init"]);
        assert!(matches!(args.command, Some(CookieShieldCommands::Config { command: ConfigCommands::Init })));
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(CookieShieldArguments::try_parse_from(["cookieshield", "-l", "70000"]).is_err());
        assert!(CookieShieldArguments::try_parse_from(["cookieshield", "--cookie-match", "exact"]).is_err());
    }

    #[tokio::test]
    async fn test_handle_arguments_without_command() {
        let args = CookieShieldArguments::parse_from(["cookieshield"]);
        assert!(!args.handle_arguments().await.unwrap());
    }

    #[tokio::test]
    async fn test_handle_config_init() {
        let dir = std::env::temp_dir().join(format!("cookieshield-cli-init-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("cookieshield.json");
        let path_arg = path.to_string_lossy().into_owned();

        let args = CookieShieldArguments::parse_from(["cookieshield", "-c", path_arg.as_str(), "config", "init"]);
        assert!(args.handle_arguments().await.unwrap());
        let written: Config = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.backend_addr(), "localhost:9000");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_handle_config_init_keeps_existing_file() {
        let dir = std::env::temp_dir().join(format!("cookieshield-cli-init-existing-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cookieshield.json");
        let custom = r#"{"backend_host": "authentik-server", "backend_port": 9100}"#;
        std::fs::write(&path, custom).unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let args = CookieShieldArguments::parse_from(["cookieshield", "-c", path_arg.as_str(), "config", "init"]);
        let err = args.handle_arguments().await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), custom);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
