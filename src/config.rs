//! Server configuration and command-line parsing.

use crate::storage::ExpiryConfig;
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Errors produced while reading the command line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value '{value}' for {flag}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// What the binary should do after parsing its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Run(ServerConfig),
    Help,
    Version,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on (0 picks an ephemeral port)
    pub port: u16,
    /// Number of independent keyspaces
    pub databases: usize,
    /// Keys sampled per database by each active expiry cycle
    pub expire_check_count: usize,
    /// Milliseconds between active expiry cycles
    pub expire_check_interval_ms: u64,
    /// Longest time the reactor blocks in `epoll_wait`
    pub idle_tick_ms: u64,
    /// Maximum log level
    pub log_level: Level,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            databases: 10,
            expire_check_count: 10,
            expire_check_interval_ms: 100,
            idle_tick_ms: 10,
            log_level: Level::INFO,
        }
    }
}

impl ServerConfig {
    /// Parses the process arguments.
    pub fn from_args() -> Result<CliAction, ConfigError> {
        Self::parse_args(std::env::args().skip(1))
    }

    /// Parses `args` (program name excluded).
    pub fn parse_args<I>(args: I) -> Result<CliAction, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = ServerConfig::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => config.host = value_for(&arg, &mut args)?,
                "--port" | "-p" => config.port = parse_value(&arg, &mut args)?,
                "--databases" => {
                    config.databases = parse_value(&arg, &mut args)?;
                    if config.databases == 0 {
                        return Err(ConfigError::InvalidValue {
                            flag: "--databases".to_string(),
                            value: "0".to_string(),
                        });
                    }
                }
                "--log-level" => config.log_level = parse_value(&arg, &mut args)?,
                "--help" => return Ok(CliAction::Help),
                "--version" | "-v" => return Ok(CliAction::Version),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(CliAction::Run(config))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Log filter from `RUST_LOG`, falling back to `--log-level`.
    pub fn log_filter(&self) -> EnvFilter {
        let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        self.log_filter_from(directives.as_deref())
    }

    fn log_filter_from(&self, directives: Option<&str>) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.log_level).into())
            .parse_lossy(directives.unwrap_or_default())
    }

    pub fn expiry_config(&self) -> ExpiryConfig {
        ExpiryConfig {
            samples_per_db: self.expire_check_count,
            interval_ms: self.expire_check_interval_ms,
        }
    }
}

fn value_for(flag: &str, args: &mut impl Iterator<Item = String>) -> Result<String, ConfigError> {
    args.next()
        .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parse_value<T: FromStr>(
    flag: &str,
    args: &mut impl Iterator<Item = String>,
) -> Result<T, ConfigError> {
    let value = value_for(flag, args)?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value,
    })
}
