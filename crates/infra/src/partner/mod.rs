//! Partner API integration
//!
//! Credential exchange, the shared bearer token cache and the delivery client.

pub mod auth;
pub mod client;
pub mod errors;
pub mod token_cache;

pub use auth::{CredentialExchange, IssuedToken, PartnerAuthenticator};
pub use client::PartnerClient;
pub use errors::PartnerError;
pub use token_cache::{CachedToken, TokenCache};
