//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If a required variable is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! Required:
//! - `PARTNER_BASE_URL`, `PARTNER_CLIENT_ID`, `PARTNER_USERNAME`, `PARTNER_PASSWORD`
//! - `DB_NAME`, `DB_USER`, `DB_PASSWORD`
//!
//! Optional (default in parentheses):
//! - `PARTNER_AUTH_TIMEOUT_MS` (5000), `PARTNER_DELIVERY_TIMEOUT_MS` (10000)
//! - `PARTNER_TOKEN_LIFETIME_SECS` (3600), `PARTNER_TOKEN_MARGIN_SECS` (30)
//! - `DB_HOST` (localhost), `DB_PORT` (5432), `DB_POOL_SIZE` (5)
//! - `DB_TIMEZONE` (UTC), `DB_CONNECT_TIMEOUT_MS` (5000), `DB_STATEMENT_TIMEOUT_MS` (30000)
//! - `POLL_INTERVAL_MS` (60000), `SYNC_PAGE_SIZE` (50)
//! - `MAX_DB_RETRIES` (5), `DB_RETRY_DELAY_MS` (5000)
//! - `REPORT_TIMEZONE` (local)
//! - `LOG_LEVEL` (info), `LOG_DIRECTORY` (logs), `LOG_FORMAT` (text)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./trackrelay.{toml,json}` or `./config.{toml,json}` (current working directory)
//! 2. `../config.{toml,json}` (parent directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use trackrelay_domain::constants::{
    DEFAULT_AUTH_TIMEOUT_MS, DEFAULT_DB_CONNECT_TIMEOUT_MS, DEFAULT_DB_HOST, DEFAULT_DB_POOL_SIZE,
    DEFAULT_DB_PORT, DEFAULT_DB_RETRY_DELAY_MS, DEFAULT_DB_STATEMENT_TIMEOUT_MS,
    DEFAULT_DELIVERY_TIMEOUT_MS, DEFAULT_LOG_DIRECTORY, DEFAULT_LOG_LEVEL, DEFAULT_MAX_DB_RETRIES,
    DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TOKEN_LIFETIME_SECS,
    DEFAULT_TOKEN_MARGIN_SECS,
};
use trackrelay_domain::{
    Config, DatabaseConfig, LogFormat, LoggingConfig, PartnerConfig, RelayError, Result,
    SyncConfig, ZoneSetting,
};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["trackrelay.toml", "trackrelay.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If a required
/// variable is missing, falls back to loading from a config file. A present
/// but invalid variable is reported instead of being masked by the file.
///
/// # Errors
/// Returns `RelayError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A value fails validation
pub fn load() -> Result<Config> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(EnvError::Missing(key)) => {
            tracing::debug!(missing = key, "Environment incomplete, trying file");
            load_from_file(None)?
        }
        Err(EnvError::Invalid(err)) => return Err(err),
    };

    config.validate()?;
    Ok(config)
}

/// Why the environment could not produce a configuration.
#[derive(Debug)]
pub enum EnvError {
    /// A required variable is not set
    Missing(&'static str),
    /// A variable is set to an unusable value
    Invalid(RelayError),
}

impl From<EnvError> for RelayError {
    fn from(err: EnvError) -> Self {
        match err {
            EnvError::Missing(key) => {
                RelayError::Config(format!("Missing required environment variable: {key}"))
            }
            EnvError::Invalid(err) => err,
        }
    }
}

impl From<RelayError> for EnvError {
    fn from(err: RelayError) -> Self {
        EnvError::Invalid(err)
    }
}

/// Load configuration from environment variables
///
/// All required environment variables must be present; optional ones fall
/// back to their defaults. The result is not validated.
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// [`EnvError::Missing`] names the first absent required variable;
/// [`EnvError::Invalid`] carries a `RelayError::Config` for a bad value.
pub fn load_from_env() -> std::result::Result<Config, EnvError> {
    let partner = PartnerConfig {
        base_url: env_var("PARTNER_BASE_URL")?,
        client_id: env_parse_required("PARTNER_CLIENT_ID")?,
        username: env_var("PARTNER_USERNAME")?,
        password: env_var("PARTNER_PASSWORD")?,
        auth_timeout_ms: env_parse("PARTNER_AUTH_TIMEOUT_MS", DEFAULT_AUTH_TIMEOUT_MS)?,
        delivery_timeout_ms: env_parse("PARTNER_DELIVERY_TIMEOUT_MS", DEFAULT_DELIVERY_TIMEOUT_MS)?,
        token_lifetime_secs: env_parse("PARTNER_TOKEN_LIFETIME_SECS", DEFAULT_TOKEN_LIFETIME_SECS)?,
        token_margin_secs: env_parse("PARTNER_TOKEN_MARGIN_SECS", DEFAULT_TOKEN_MARGIN_SECS)?,
    };

    let database = DatabaseConfig {
        host: env_opt("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
        port: env_parse("DB_PORT", DEFAULT_DB_PORT)?,
        name: env_var("DB_NAME")?,
        user: env_var("DB_USER")?,
        password: env_var("DB_PASSWORD")?,
        pool_size: env_parse("DB_POOL_SIZE", DEFAULT_DB_POOL_SIZE)?,
        timezone: env_zone("DB_TIMEZONE", ZoneSetting::UTC)?,
        connect_timeout_ms: env_parse("DB_CONNECT_TIMEOUT_MS", DEFAULT_DB_CONNECT_TIMEOUT_MS)?,
        statement_timeout_ms: env_parse(
            "DB_STATEMENT_TIMEOUT_MS",
            DEFAULT_DB_STATEMENT_TIMEOUT_MS,
        )?,
    };

    let sync = SyncConfig {
        poll_interval_ms: env_parse("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
        page_size: env_parse("SYNC_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
        max_db_retries: env_parse("MAX_DB_RETRIES", DEFAULT_MAX_DB_RETRIES)?,
        db_retry_delay_ms: env_parse("DB_RETRY_DELAY_MS", DEFAULT_DB_RETRY_DELAY_MS)?,
        report_timezone: env_zone("REPORT_TIMEZONE", ZoneSetting::Local)?,
    };

    let logging = LoggingConfig {
        level: env_opt("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        directory: env_opt("LOG_DIRECTORY").unwrap_or_else(|| DEFAULT_LOG_DIRECTORY.to_string()),
        format: env_opt("LOG_FORMAT")
            .map(|raw| LogFormat::from_str(&raw).map_err(RelayError::Config))
            .transpose()?
            .unwrap_or_default(),
    };

    Ok(Config { partner, database, sync, logging })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `RelayError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RelayError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            RelayError::Config(
                "No configuration in environment and no config file in any standard location"
                    .to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| RelayError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `RelayError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| RelayError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RelayError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(RelayError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &'static str) -> std::result::Result<String, EnvError> {
    env_opt(key).ok_or(EnvError::Missing(key))
}

/// Get optional environment variable, treating empty values as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse optional environment variable, falling back to `default`
fn env_parse<T>(key: &str, default: T) -> std::result::Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

/// Parse required environment variable
fn env_zone(key: &str, default: ZoneSetting) -> std::result::Result<ZoneSetting, EnvError> {
    match env_opt(key) {
        Some(raw) => Ok(ZoneSetting::from_str(&raw)?),
        None => Ok(default),
    }
}

fn env_parse_required<T>(key: &'static str) -> std::result::Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_var(key)?;
    parse_value(key, &raw)
}

fn parse_value<T>(key: &str, raw: &str) -> std::result::Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        EnvError::Invalid(RelayError::Config(format!("Invalid value for {key} ({raw:?}): {e}")))
    })
}
