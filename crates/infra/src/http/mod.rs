//! HTTP transport shared by partner API calls

pub mod client;

pub use client::{HttpClient, HttpClientBuilder, HttpError};
