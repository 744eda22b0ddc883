//! Configuration structures
//!
//! Loaded by the infrastructure layer from the environment or a config file
//! and checked once at startup with [`Config::validate`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTH_TIMEOUT_MS, DEFAULT_DB_CONNECT_TIMEOUT_MS, DEFAULT_DB_HOST, DEFAULT_DB_POOL_SIZE,
    DEFAULT_DB_PORT, DEFAULT_DB_RETRY_DELAY_MS, DEFAULT_DB_STATEMENT_TIMEOUT_MS,
    DEFAULT_DELIVERY_TIMEOUT_MS, DEFAULT_LOG_DIRECTORY, DEFAULT_LOG_LEVEL, DEFAULT_MAX_DB_RETRIES,
    DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TOKEN_LIFETIME_SECS,
    DEFAULT_TOKEN_MARGIN_SECS,
};
use crate::errors::{RelayError, Result};
use crate::impl_domain_status_conversions;

/// Top-level worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub partner: PartnerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `RelayError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        self.partner.validate()?;
        self.database.validate()?;
        self.sync.validate()
    }
}

/// Partner API access
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerConfig {
    pub base_url: String,
    pub client_id: i64,
    pub username: String,
    pub password: String,
    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: u64,
    #[serde(default = "default_token_margin_secs")]
    pub token_margin_secs: u64,
}

impl PartnerConfig {
    /// Limit on one credential exchange.
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    /// Limit on one delivery request.
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Lifetime assumed when the partner does not state one.
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_secs)
    }

    /// How long before expiry a token stops being reused.
    pub fn token_margin(&self) -> Duration {
        Duration::from_secs(self.token_margin_secs)
    }

    fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RelayError::Config(format!(
                "Partner base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.username.trim().is_empty() {
            return Err(RelayError::Config("Partner username must not be empty".to_string()));
        }
        if self.auth_timeout_ms == 0 || self.delivery_timeout_ms == 0 {
            return Err(RelayError::Config("Partner timeouts must be positive".to_string()));
        }
        if self.token_margin_secs >= self.token_lifetime_secs {
            return Err(RelayError::Config(format!(
                "Token safety margin ({}s) must be shorter than the token lifetime ({}s)",
                self.token_margin_secs, self.token_lifetime_secs
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for PartnerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartnerConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_timeout_ms", &self.auth_timeout_ms)
            .field("delivery_timeout_ms", &self.delivery_timeout_ms)
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .field("token_margin_secs", &self.token_margin_secs)
            .finish()
    }
}

/// PostgreSQL connection settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_db_pool_size")]
    pub pool_size: usize,
    /// Zone of fix times stored without one.
    #[serde(default = "default_db_timezone")]
    pub timezone: ZoneSetting,
    #[serde(default = "default_db_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_db_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Limit on opening a connection, including the startup handshake.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Limit on one statement, including the wait for a pooled connection.
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(RelayError::Config("Database pool size must be at least 1".to_string()));
        }
        if self.connect_timeout_ms == 0 || self.statement_timeout_ms == 0 {
            return Err(RelayError::Config("Database timeouts must be positive".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(RelayError::Config("Database name must not be empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("pool_size", &self.pool_size)
            .field("timezone", &self.timezone)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .finish()
    }
}

/// Polling cycle and store retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_db_retries")]
    pub max_db_retries: u32,
    #[serde(default = "default_db_retry_delay_ms")]
    pub db_retry_delay_ms: u64,
    /// Zone `fecha` is rendered in.
    #[serde(default)]
    pub report_timezone: ZoneSetting,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            page_size: DEFAULT_PAGE_SIZE,
            max_db_retries: DEFAULT_MAX_DB_RETRIES,
            db_retry_delay_ms: DEFAULT_DB_RETRY_DELAY_MS,
            report_timezone: ZoneSetting::Local,
        }
    }
}

impl SyncConfig {
    /// Sleep between the end of one cycle and the start of the next.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Fixed delay between store retries.
    pub fn db_retry_delay(&self) -> Duration {
        Duration::from_millis(self.db_retry_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(RelayError::Config("Sync page size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Configured time zone: the process-local zone or a named IANA zone.
///
/// Used to read fix times the store keeps without a zone and to render
/// `fecha` for the partner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ZoneSetting {
    /// The process-local zone.
    #[default]
    Local,
    /// A named IANA zone such as `America/Santiago`.
    Named(Tz),
}

impl ZoneSetting {
    /// Coordinated Universal Time.
    pub const UTC: Self = Self::Named(Tz::UTC);

    /// Format `instant` in this zone.
    pub fn format(&self, instant: DateTime<Utc>, pattern: &str) -> String {
        match self {
            Self::Local => instant.with_timezone(&chrono::Local).format(pattern).to_string(),
            Self::Named(tz) => instant.with_timezone(tz).format(pattern).to_string(),
        }
    }

    /// Interpret a wall-clock time in this zone.
    ///
    /// Ambiguous times resolve to the earlier instant. Times skipped by a DST
    /// jump are read with the offset in force before the jump, which lands
    /// them the length of the gap later on the new wall clock.
    pub fn localize(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self {
            Self::Local => localize_in(&chrono::Local, naive),
            Self::Named(tz) => localize_in(tz, naive),
        }
    }

    /// True when `naive` does not exist on this zone's wall clock.
    pub fn is_skipped(&self, naive: NaiveDateTime) -> bool {
        match self {
            Self::Local => matches!(chrono::Local.from_local_datetime(&naive), LocalResult::None),
            Self::Named(tz) => matches!(tz.from_local_datetime(&naive), LocalResult::None),
        }
    }
}

fn localize_in<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> DateTime<Utc> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(local) | LocalResult::Ambiguous(local, _) => local.with_timezone(&Utc),
        LocalResult::None => {
            let before = zone.offset_from_utc_datetime(&(naive - TimeDelta::days(1))).fix();
            Utc.from_utc_datetime(&naive) - TimeDelta::seconds(i64::from(before.local_minus_utc()))
        }
    }
}

impl FromStr for ZoneSetting {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        if trimmed.eq_ignore_ascii_case("z") {
            return Ok(Self::UTC);
        }
        trimmed
            .parse::<Tz>()
            .map(Self::Named)
            .map_err(|e| RelayError::Config(format!("Unknown time zone '{trimmed}': {e}")))
    }
}

impl fmt::Display for ZoneSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Named(tz) => f.write_str(tz.name()),
        }
    }
}

impl TryFrom<String> for ZoneSetting {
    type Error = RelayError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ZoneSetting> for String {
    fn from(value: ZoneSetting) -> Self {
        value.to_string()
    }
}

/// Log output encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl_domain_status_conversions!(LogFormat {
    Text => "text",
    Json => "json",
});

/// Logging destination and verbosity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_directory")]
    pub directory: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
            format: LogFormat::Text,
        }
    }
}

fn default_auth_timeout_ms() -> u64 {
    DEFAULT_AUTH_TIMEOUT_MS
}

fn default_delivery_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_MS
}

fn default_token_lifetime_secs() -> u64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}

fn default_token_margin_secs() -> u64 {
    DEFAULT_TOKEN_MARGIN_SECS
}

fn default_db_host() -> String {
    DEFAULT_DB_HOST.to_string()
}

fn default_db_port() -> u16 {
    DEFAULT_DB_PORT
}

fn default_db_pool_size() -> usize {
    DEFAULT_DB_POOL_SIZE
}

fn default_db_timezone() -> ZoneSetting {
    ZoneSetting::UTC
}

fn default_db_connect_timeout_ms() -> u64 {
    DEFAULT_DB_CONNECT_TIMEOUT_MS
}

fn default_db_statement_timeout_ms() -> u64 {
    DEFAULT_DB_STATEMENT_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_db_retries() -> u32 {
    DEFAULT_MAX_DB_RETRIES
}

fn default_db_retry_delay_ms() -> u64 {
    DEFAULT_DB_RETRY_DELAY_MS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_log_directory() -> String {
    DEFAULT_LOG_DIRECTORY.to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> Config {
        Config {
            partner: PartnerConfig {
                base_url: "https://partner.example".to_string(),
                client_id: 42,
                username: "relay".to_string(),
                password: "secret".to_string(),
                auth_timeout_ms: DEFAULT_AUTH_TIMEOUT_MS,
                delivery_timeout_ms: DEFAULT_DELIVERY_TIMEOUT_MS,
                token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
                token_margin_secs: DEFAULT_TOKEN_MARGIN_SECS,
            },
            database: DatabaseConfig {
                host: default_db_host(),
                port: DEFAULT_DB_PORT,
                name: "tracking".to_string(),
                user: "relay".to_string(),
                password: "secret".to_string(),
                pool_size: DEFAULT_DB_POOL_SIZE,
                timezone: ZoneSetting::UTC,
                connect_timeout_ms: DEFAULT_DB_CONNECT_TIMEOUT_MS,
                statement_timeout_ms: DEFAULT_DB_STATEMENT_TIMEOUT_MS,
            },
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn sample_config_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn margin_must_be_below_lifetime() {
        let mut config = sample();
        config.partner.token_margin_secs = config.partner.token_lifetime_secs;

        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let mut config = sample();
        config.database.pool_size = 0;

        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let mut config = sample();
        config.partner.base_url = "ftp://partner.example".to_string();

        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn timezone_parses_local_and_iana_names() {
        assert_eq!("local".parse::<ZoneSetting>().unwrap(), ZoneSetting::Local);
        assert_eq!("".parse::<ZoneSetting>().unwrap(), ZoneSetting::Local);
        assert_eq!(
            "America/Santiago".parse::<ZoneSetting>().unwrap(),
            ZoneSetting::Named(chrono_tz::America::Santiago)
        );
        assert!("Mars/Olympus".parse::<ZoneSetting>().is_err());
    }

    #[test]
    fn named_timezone_formats_in_zone() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let tz = ZoneSetting::Named(chrono_tz::UTC);

        assert_eq!(tz.format(instant, "%Y-%m-%d %H:%M:%S"), "2024-01-15 12:00:00");
    }

    #[test]
    fn sections_default_when_missing_from_file() {
        let json = r#"{
            "partner": {
                "base_url": "https://partner.example",
                "client_id": 7,
                "username": "u",
                "password": "p"
            },
            "database": { "name": "tracking", "user": "u", "password": "p" }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.partner.token_lifetime_secs, 3600);
    }

    #[test]
    fn debug_output_redacts_passwords() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32, sec: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, sec).unwrap()
    }

    #[test]
    fn naive_times_are_localized_in_the_named_zone() {
        let tz: ZoneSetting = "America/Santiago".parse().unwrap();

        assert_eq!(
            tz.localize(naive(2024, 2, 29, 20, 5, 9)),
            Utc.with_ymd_and_hms(2024, 2, 29, 23, 5, 9).unwrap()
        );
        assert!(!tz.is_skipped(naive(2024, 2, 29, 20, 5, 9)));
    }

    #[test]
    fn times_in_a_spring_forward_gap_keep_the_pre_jump_offset() {
        // Santiago jumps from 00:00 -04 to 01:00 -03 on 2024-09-08.
        let tz = ZoneSetting::Named(chrono_tz::America::Santiago);
        let skipped = naive(2024, 9, 8, 0, 30, 0);

        assert!(tz.is_skipped(skipped));
        let instant = tz.localize(skipped);
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 9, 8, 4, 30, 0).unwrap());
        assert_eq!(tz.format(instant, "%Y-%m-%d %H:%M:%S"), "2024-09-08 01:30:00");
    }

    #[test]
    fn ambiguous_times_resolve_to_the_earlier_instant() {
        // Santiago falls back from 00:00 -03 to 23:00 -04 on 2024-04-07.
        let tz = ZoneSetting::Named(chrono_tz::America::Santiago);

        assert_eq!(
            tz.localize(naive(2024, 4, 6, 23, 30, 0)),
            Utc.with_ymd_and_hms(2024, 4, 7, 2, 30, 0).unwrap()
        );
    }

    #[test]
    fn z_and_utc_name_the_utc_zone() {
        assert_eq!("Z".parse::<ZoneSetting>().unwrap(), ZoneSetting::UTC);
        assert_eq!("UTC".parse::<ZoneSetting>().unwrap(), ZoneSetting::UTC);
        assert_eq!(ZoneSetting::UTC.to_string(), "UTC");
    }

    #[test]
    fn store_zone_and_timeouts_default() {
        let json = r#"{ "name": "tracking", "user": "u", "password": "p" }"#;
        let database: DatabaseConfig = serde_json::from_str(json).unwrap();

        assert_eq!(database.timezone, ZoneSetting::UTC);
        let connect = Duration::from_millis(DEFAULT_DB_CONNECT_TIMEOUT_MS);
        assert_eq!(database.connect_timeout(), connect);
        assert_eq!(
            database.statement_timeout(),
            Duration::from_millis(DEFAULT_DB_STATEMENT_TIMEOUT_MS)
        );
    }

    #[test]
    fn zero_store_timeout_is_rejected() {
        let mut config = sample();
        config.database.statement_timeout_ms = 0;

        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }
}
