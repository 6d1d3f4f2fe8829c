use clap::Parser;
use std::path::PathBuf;

use crate::settings::{Settings, DEFAULT_CONFIG_PATH};

/// Campus wallet transaction and progression service
#[derive(Parser, Debug)]
#[command(name = "campus-wallet")]
#[command(about = "Campus wallet transaction and progression service", long_about = None)]
pub struct CliArgs {
    /// Configuration file (TOML)
    #[arg(
        long = "config",
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to the TOML configuration file; a missing file is not an error"
    )]
    pub config: PathBuf,

    /// Address to listen on
    #[arg(long = "bind", value_name = "ADDR", help = "Override server.bind")]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(long = "port", value_name = "PORT", help = "Override server.port")]
    pub port: Option<u16>,

    /// Log filter directive
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        env = "RUST_LOG",
        help = "Override log.level (e.g. 'info' or 'campus_wallet=debug')"
    )]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Apply command-line overrides on top of loaded settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(bind) = &self.bind {
            settings.server.bind = bind.clone();
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.log.level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::defaults(&["campus-wallet"], DEFAULT_CONFIG_PATH)]
    #[case::explicit(&["campus-wallet", "--config", "/etc/wallet.toml"], "/etc/wallet.toml")]
    fn test_config_path(#[case] args: &[&str], #[case] expected: &str) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.config, PathBuf::from(expected));
    }

    #[rstest]
    #[case::nothing(&["campus-wallet"], "127.0.0.1", 3000)]
    #[case::port(&["campus-wallet", "--port", "8080"], "127.0.0.1", 8080)]
    #[case::bind(&["campus-wallet", "--bind", "0.0.0.0"], "0.0.0.0", 3000)]
    #[case::both(&["campus-wallet", "--bind", "0.0.0.0", "--port", "9000"], "0.0.0.0", 9000)]
    fn test_overrides(#[case] args: &[&str], #[case] bind: &str, #[case] port: u16) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        let mut settings = Settings::default();

        parsed.apply(&mut settings);

        assert_eq!(settings.server.bind, bind);
        assert_eq!(settings.server.port, port);
    }

    #[test]
    fn test_log_level_override() {
        let parsed =
            CliArgs::try_parse_from(["campus-wallet", "--log-level", "debug"]).unwrap();
        let mut settings = Settings::default();

        parsed.apply(&mut settings);

        assert_eq!(settings.log.level, "debug");
    }

    #[rstest]
    #[case::port_not_a_number(&["campus-wallet", "--port", "http"])]
    #[case::port_too_large(&["campus-wallet", "--port", "70000"])]
    #[case::unknown_flag(&["campus-wallet", "--workers", "4"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
