//! # Book Gateway Core
//!
//! Canonical data model, error taxonomy, configuration, and shared
//! validation/sanitization primitives for the Book Gateway platform.
//!
//! ## Modules
//!
//! - `models`: `Work`, `Edition`, `Author`, `Job`, `Photo`, `AuthToken`, `CacheEntry`
//! - `error`: the `GatewayError` taxonomy shared across crates
//! - `config`: `GatewayConfig`, loaded from env/yaml via `config`+`dotenvy`
//! - `genre`: canonical genre normalization table
//! - `isbn`: ISBN-10/13 checksum validation
//! - `envelope`: the HTTP success/error envelope and the WebSocket envelope
//! - `secrets`: uniform accessor over raw-string or async-resolved secrets
//! - `sanitization`: input sanitization for free-text fields

pub mod config;
pub mod envelope;
pub mod error;
pub mod genre;
pub mod http;
pub mod isbn;
pub mod models;
pub mod sanitization;
pub mod secrets;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use models::{Author, AuthToken, CacheEntry, Edition, Job, JobStatus, Photo, Work};

/// Result type alias for Book Gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
