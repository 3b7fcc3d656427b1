//! Server configuration.
//!
//! Values are resolved from, lowest to highest precedence: built-in defaults, a TOML file,
//! environment variables and command-line flags.

use clap::Parser;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;

pub const DEFAULT_CONFIG_FILE: &str = "arcdis.toml";
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6378;
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Command-line flags. Each one can also be given through its environment variable; a flag on
/// the command line wins over the variable.
#[derive(Parser, Debug, Default)]
#[command(name = "arcdis", version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "ARCDIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "ARCDIS_BIND")]
    pub bind: Option<String>,

    /// The port to listen on
    #[arg(short, long, env = "ARCDIS_PORT")]
    pub port: Option<u16>,

    /// Initial size in bytes of each connection's read buffer
    #[arg(long, env = "ARCDIS_BUFFER_SIZE")]
    pub buffer_size: Option<usize>,

    /// Largest frame in bytes a client may send
    #[arg(long, env = "ARCDIS_MAX_FRAME_SIZE")]
    pub max_frame_size: Option<usize>,

    /// Log filter, e.g. `info` or `arcdis=debug`. `RUST_LOG` takes precedence
    #[arg(long, env = "ARCDIS_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Layout of the TOML configuration file. Every key is optional.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub buffer_size: Option<usize>,
    pub max_frame_size: Option<usize>,
    pub log_level: Option<String>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub buffer_size: usize,
    pub max_frame_size: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Resolves the configuration from the process arguments and environment.
    pub fn load() -> Result<Config, ConfigError> {
        Config::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Config, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::read(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                FileConfig::read(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => FileConfig::default(),
        };

        Config::merge(args, file)
    }

    fn merge(args: Args, file: FileConfig) -> Result<Config, ConfigError> {
        let defaults = Config::default();

        let config = Config {
            bind: args.bind.or(file.bind).unwrap_or(defaults.bind),
            port: args.port.or(file.port).unwrap_or(defaults.port),
            buffer_size: args
                .buffer_size
                .or(file.buffer_size)
                .unwrap_or(defaults.buffer_size),
            max_frame_size: args
                .max_frame_size
                .or(file.max_frame_size)
                .unwrap_or(defaults.max_frame_size),
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer size must be greater than zero"));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid(
                "max frame size must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Looks up a numeric setting by its flat name.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match key {
            "port" => Some(i64::from(self.port)),
            "buffersize" => i64::try_from(self.buffer_size).ok(),
            "maxframesize" => i64::try_from(self.max_frame_size).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let config = Config::merge(Args::default(), FileConfig::default()).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.get_int("port"), Some(6378));
        assert_eq!(config.get_int("buffersize"), Some(128 * 1024));
        assert_eq!(config.get_int("nope"), None);
    }

    #[test]
    fn file_overrides_defaults() {
        let file = write_config("port = 7000\nbuffer_size = 4096\n");

        let args = Args {
            config: Some(file.path().to_path_buf()),
            ..Args::default()
        };
        let config = Config::from_args(args).unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.bind, DEFAULT_BIND);
    }

    #[test]
    fn args_override_file() {
        let file = FileConfig {
            port: Some(7000),
            log_level: Some("debug".to_string()),
            ..FileConfig::default()
        };
        let args = Args::try_parse_from(["arcdis", "--port", "7001"]).unwrap();

        let config = Config::merge(args, file).unwrap();

        assert_eq!(config.port, 7001);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let file = write_config("prot = 7000\n");

        let err = FileConfig::read(file.path()).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file() {
        let err = FileConfig::read(Path::new("/definitely/not/here.toml")).unwrap_err();

        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn zero_buffer_size_is_invalid() {
        let file = FileConfig {
            buffer_size: Some(0),
            ..FileConfig::default()
        };

        let err = Config::merge(Args::default(), file).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
