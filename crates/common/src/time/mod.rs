//! Time utilities and abstractions
//!
//! - **Clock abstractions**: real and mock wall clocks, so expiry and
//!   timestamp logic can be tested without sleeping.
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Duration;
//! use trackrelay_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let before = clock.now_utc();
//! clock.advance(Duration::seconds(5));
//! assert_eq!(clock.now_utc() - before, Duration::seconds(5));
//! ```

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
