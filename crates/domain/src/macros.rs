//! Macro for implementing string conversions on status enums
//!
//! Generates `as_str`, `Display` and `FromStr` from a single variant table so
//! log fields and config values always agree on spelling.
//!
//! # Example
//!
//! ```rust
//! use trackrelay_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum LinkState {
//!     Up,
//!     Down,
//! }
//!
//! impl_domain_status_conversions!(LinkState {
//!     Up => "up",
//!     Down => "down",
//! });
//!
//! assert_eq!(LinkState::Up.as_str(), "up");
//! assert_eq!("DOWN".parse::<LinkState>(), Ok(LinkState::Down));
//! ```

/// Implements `as_str`, Display and FromStr for status enums
///
/// Parsing is case-insensitive and ignores surrounding whitespace; output is
/// always the lowercase table spelling.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical lowercase spelling.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
