//! Process-level server settings.
//!
//! These are distinct from the managed scraper configuration: they describe
//! where the server listens and where the configuration document lives, are
//! read once at startup, and are not editable over the API.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub config_path: PathBuf,
    pub scraper_bin: PathBuf,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Load server settings from the process environment.
///
/// # Errors
///
/// Returns [`SettingsError`] if a set variable fails to parse.
pub fn load_server_config() -> Result<ServerConfig, SettingsError> {
    build_server_config(|key| std::env::var(key))
}

/// Core parsing logic, decoupled from the actual environment so tests can
/// feed a plain `HashMap` lookup.
fn build_server_config<F>(lookup: F) -> Result<ServerConfig, SettingsError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let bind_addr = or_default("FMS_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| SettingsError::InvalidEnvVar {
            var: "FMS_BIND_ADDR".to_string(),
            reason: e.to_string(),
        })?;

    Ok(ServerConfig {
        bind_addr,
        log_level: or_default("FMS_LOG_LEVEL", "info"),
        config_path: PathBuf::from(or_default("FMS_CONFIG_PATH", "./config.json")),
        scraper_bin: PathBuf::from(or_default("FMS_SCRAPER_BIN", "./bin/forum-media-scraper")),
    })
}
