//! Command-line and TOML configuration for the `redis-emu` binary.
//!
//! CLI arguments take precedence over the config file, and the file over
//! the built-in defaults.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    emulator::{EmulatorConfig, CLIENT_SETINFO, DEFAULT_PORT, DEFAULT_SAVE_INTERVAL},
    keyspace::DEFAULT_STORE_COUNT,
};

#[derive(Parser, Debug, Default)]
#[command(name = "redis-emu")]
#[command(version)]
#[command(about = "An in-memory Redis protocol emulator", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// TCP port to listen on (0 picks a free port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Interface address to bind (all interfaces when omitted)
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Snapshot base path; the keyspace is not persisted when omitted
    #[arg(long)]
    pub persist: Option<PathBuf>,

    /// Number of databases
    #[arg(long)]
    pub databases: Option<usize>,

    /// Milliseconds between background saves
    #[arg(long)]
    pub save_interval_ms: Option<u64>,

    /// Command to answer as unknown; use `parent|sub` for subcommands
    #[arg(long = "disable-command")]
    pub disable_commands: Vec<String>,

    /// Reject CLIENT SETINFO like servers older than 7.2
    #[arg(long)]
    pub disable_client_setinfo: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub interface: String,
    #[serde(default = "default_databases")]
    pub databases: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            interface: String::new(),
            databases: default_databases(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default = "default_save_interval_ms")]
    pub save_interval_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            save_interval_ms: default_save_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CommandsConfig {
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default)]
    pub disable_client_setinfo: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_databases() -> usize {
    DEFAULT_STORE_COUNT
}

fn default_save_interval_ms() -> u64 {
    DEFAULT_SAVE_INTERVAL.as_millis() as u64
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{}': {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("databases must be at least 1")]
    NoDatabases,
    #[error("save interval must be at least 1 ms")]
    ZeroSaveInterval,
}

/// Final resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub emulator: EmulatorConfig,
    pub log_level: String,
}

impl Settings {
    /// Parses the process arguments and the config file they name.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
                        path: path.clone(),
                        source,
                    })?;
                toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
                    path: path.clone(),
                    source,
                })?
            }
            None => TomlConfig::default(),
        };

        Self::merge(cli, file)
    }

    pub fn merge(cli: CliArgs, file: TomlConfig) -> Result<Self, ConfigError> {
        let databases = cli.databases.unwrap_or(file.server.databases);
        if databases == 0 {
            return Err(ConfigError::NoDatabases);
        }

        let save_interval_ms = cli
            .save_interval_ms
            .unwrap_or(file.persistence.save_interval_ms);
        if save_interval_ms == 0 {
            return Err(ConfigError::ZeroSaveInterval);
        }

        let mut disabled_commands = file.commands.disabled;
        disabled_commands.extend(cli.disable_commands);
        if cli.disable_client_setinfo || file.commands.disable_client_setinfo {
            disabled_commands.push(CLIENT_SETINFO.to_string());
        }

        Ok(Settings {
            emulator: EmulatorConfig {
                port: cli.port.unwrap_or(file.server.port),
                interface: cli.interface.unwrap_or(file.server.interface),
                persist_path: cli.persist.unwrap_or(file.persistence.path),
                databases,
                save_interval: Duration::from_millis(save_interval_ms),
                disabled_commands,
            },
            log_level: cli.log_level.unwrap_or(file.logging.level),
        })
    }
}
