//! Application configuration
//!
//! Defaults, overridden by environment variables, overridden by command line
//! flags:
//!
//! - `MEDIA_CATALOG_DATABASE`: SQLite file (default `media_catalog.db`)
//! - `MEDIA_CATALOG_BIND`: address of the extension endpoint (default `127.0.0.1:8765`)
//! - `MEDIA_CATALOG_PAGE_SIZE`: report page size (default 50)
//! - `MEDIA_CATALOG_POOL_SIZE`: connection pool size (default 4)
//! - `MEDIA_CATALOG_LOG`: tracing filter directive (default `info`)

use crate::backends::PoolConfig;
use crate::report::DEFAULT_PAGE_SIZE;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_DATABASE: &str = "MEDIA_CATALOG_DATABASE";
pub const ENV_BIND: &str = "MEDIA_CATALOG_BIND";
pub const ENV_PAGE_SIZE: &str = "MEDIA_CATALOG_PAGE_SIZE";
pub const ENV_POOL_SIZE: &str = "MEDIA_CATALOG_POOL_SIZE";
pub const ENV_LOG: &str = "MEDIA_CATALOG_LOG";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database: PathBuf,
    pub bind: SocketAddr,
    pub page_size: usize,
    pub pool_size: usize,
    /// `tracing_subscriber::EnvFilter` directive
    pub log: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("media_catalog.db"),
            bind: SocketAddr::from(([127, 0, 0, 1], 8765)),
            page_size: DEFAULT_PAGE_SIZE,
            pool_size: 4,
            log: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(database) = lookup(ENV_DATABASE) {
            config.database = PathBuf::from(database);
        }
        if let Some(bind) = lookup(ENV_BIND) {
            config.bind = parse_bind(ENV_BIND, &bind)?;
        }
        if let Some(page_size) = lookup(ENV_PAGE_SIZE) {
            config.page_size = parse_positive(ENV_PAGE_SIZE, &page_size)?;
        }
        if let Some(pool_size) = lookup(ENV_POOL_SIZE) {
            config.pool_size = parse_positive(ENV_POOL_SIZE, &pool_size)?;
        }
        if let Some(log) = lookup(ENV_LOG) {
            config.log = log;
        }
        Ok(config)
    }

    /// Apply command line flags on top
    #[must_use]
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(database) = &cli.database {
            self.database = database.clone();
        }
        if let Some(bind) = cli.bind {
            self.bind = bind;
        }
        if let Some(page_size) = cli.page_size {
            self.page_size = page_size.max(1);
        }
        if let Some(pool_size) = cli.pool_size {
            self.pool_size = pool_size.max(1);
        }
        if let Some(log) = &cli.log {
            self.log = log.clone();
        }
        self
    }

    /// Pool settings for the configured database
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.database.to_string_lossy()).with_max_size(self.pool_size)
    }
}

fn parse_bind(name: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(name, value, e))
}

fn parse_positive(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::invalid(name, value, "must be at least 1")),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::invalid(name, value, e)),
    }
}

#[derive(Debug, Parser)]
#[command(name = "media-catalog")]
#[command(about = "Personal media catalog and browser extension endpoint", long_about = None)]
pub struct Cli {
    /// SQLite database file
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Address of the extension endpoint
    #[arg(short, long, global = true)]
    pub bind: Option<SocketAddr>,

    /// Rows per report page
    #[arg(long, global = true)]
    pub page_size: Option<usize>,

    /// Connection pool size
    #[arg(long, global = true)]
    pub pool_size: Option<usize>,

    /// Log filter (e.g. `debug`, `media_catalog=trace`)
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Serve the extension API (default)
    Serve,

    /// Apply pending schema migrations and exit
    Migrate,

    /// Print one page of a report as JSON
    Report {
        /// asian_media, games or books
        name: String,

        /// Zero-based page
        #[arg(short, long, default_value_t = 0)]
        page: usize,
    },

    /// Look up titles the way the browser extension does
    Check {
        #[arg(required = true)]
        titles: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind.port(), 8765);
    }

    #[test]
    fn test_environment_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_DATABASE, "/tmp/catalog.db"),
            (ENV_BIND, "0.0.0.0:9000"),
            (ENV_PAGE_SIZE, "25"),
            (ENV_LOG, "debug"),
        ]))
        .unwrap();
        assert_eq!(config.database, PathBuf::from("/tmp/catalog.db"));
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.log, "debug");
    }

    #[test]
    fn test_invalid_values() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_PAGE_SIZE, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: ENV_PAGE_SIZE, .. }));
        assert!(AppConfig::from_lookup(lookup(&[(ENV_BIND, "localhost")])).is_err());
    }

    #[test]
    fn test_cli_overrides_environment() {
        let env = AppConfig::from_lookup(lookup(&[(ENV_PAGE_SIZE, "25"), (ENV_LOG, "warn")])).unwrap();
        let cli = Cli::parse_from(["media-catalog", "--page-size", "10", "report", "games", "-p", "2"]);
        let config = env.with_cli(&cli);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.log, "warn");
        assert_eq!(
            cli.command,
            Some(Command::Report {
                name: "games".into(),
                page: 2
            })
        );
    }
}
