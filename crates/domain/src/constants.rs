//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Partner API
pub const AUTH_ENDPOINT: &str = "/api/auth";
pub const DELIVERY_ENDPOINT: &str = "/api/data/insert";
pub const DEFAULT_AUTH_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 10_000;

// Token cache
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3_600;
pub const DEFAULT_TOKEN_MARGIN_SECS: u64 = 30;

/// Response fields that may carry the bearer token, in priority order.
pub const TOKEN_FIELD_CANDIDATES: &[&str] = &["access_token", "token"];

// Store access
pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_POOL_SIZE: usize = 5;
pub const DEFAULT_MAX_DB_RETRIES: u32 = 5;
pub const DEFAULT_DB_RETRY_DELAY_MS: u64 = 5_000;
pub const DEFAULT_DB_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DB_STATEMENT_TIMEOUT_MS: u64 = 30_000;

// Sync cycle
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_PAGE_SIZE: u32 = 50;

// Delivery status codes persisted in `delivery_status`
pub const STATUS_CODE_SENT: i16 = 1;
pub const STATUS_CODE_FAILED: i16 = 6;

/// Upper bound on the persisted delivery detail, in characters.
pub const MAX_DELIVERY_DETAIL_CHARS: usize = 4_000;

// Payload formatting
pub const FIX_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const COORDINATE_DECIMALS: usize = 6;
pub const DEFAULT_HOURMETER: &str = "00000:00:00";
pub const UNKNOWN_EVENT_DESCRIPTION: &str = "Evento sin descripción";

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_DIRECTORY: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "trackrelay";
pub const LOG_FILE_SUFFIX: &str = "log";
