//! # Book Gateway Providers
//!
//! Provider clients (GoogleBooks, OpenLibrary, ISBNdb) and their pure
//! raw-response normalizers, fronted by a shared per-provider circuit
//! breaker.

pub mod circuit_breaker;
pub mod client;
pub mod clients;
pub mod error;
pub mod normalize;
pub mod support;

pub use circuit_breaker::CircuitBreakerManager;
pub use client::{NormalizedResponse, ProviderClient, ProviderMeta};
pub use error::ProviderError;
