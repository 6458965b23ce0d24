use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const APP_NAME: &str = "medminder";
pub const DATABASE_FILE_NAME: &str = "db.sqlite3";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub database_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("Unable to determine the user's home directory")]
    NoHomeDir,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let bind_addr = env_map
            .get("BIND_ADDR")
            .map(|s| s.as_str())
            .unwrap_or("127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "BIND_ADDR".to_string(),
                    "must be an IPv4 or IPv6 address".to_string(),
                )
            })?;

        let database_path = match env_map.get("DATABASE_PATH").filter(|s| !s.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_database_path(&env_map)?,
        };

        Ok(Config {
            port,
            bind_addr,
            database_path,
        })
    }
}

/// `<config dir>/db.sqlite3`, see [`config_dir`].
pub fn default_database_path(env_map: &HashMap<String, String>) -> Result<PathBuf, ConfigError> {
    Ok(config_dir(env_map)?.join(DATABASE_FILE_NAME))
}

/// Per-user configuration directory for this application.
///
/// `%APPDATA%` on Windows; elsewhere `$XDG_CONFIG_HOME`, falling back to
/// `~/.config`. The directory is not created here; opening the database does that.
pub fn config_dir(env_map: &HashMap<String, String>) -> Result<PathBuf, ConfigError> {
    let base = if cfg!(windows) {
        env_map
            .get("APPDATA")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnv("APPDATA".to_string()))?
    } else {
        match env_map.get("XDG_CONFIG_HOME").filter(|s| !s.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join(".config"),
        }
    };

    Ok(base.join(APP_NAME))
}
