use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("durable tier unavailable: {0}")]
    DurableUnavailable(String),

    #[error("cache entry corrupt for key {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl From<CacheError> for book_gateway_core::GatewayError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::DurableUnavailable(message) => {
                book_gateway_core::GatewayError::Internal(message)
            }
            CacheError::Corrupt { key, message } => {
                book_gateway_core::GatewayError::CacheCorruption(format!("{key}: {message}"))
            }
        }
    }
}
