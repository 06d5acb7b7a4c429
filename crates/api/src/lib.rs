pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod util;

/// A `VisionScanner` that always reports the collaborator as unavailable.
/// Wired in when no vision backend is configured so `/api/scan-bookshelf`
/// still returns a well-formed `ProviderUnavailable` error instead of
/// panicking on a missing dependency.
pub struct UnavailableVisionScanner;

#[async_trait::async_trait]
impl book_gateway_pipelines::VisionScanner for UnavailableVisionScanner {
    async fn scan(
        &self,
        _request: book_gateway_pipelines::VisionScanRequest,
    ) -> Result<book_gateway_pipelines::VisionScanResponse, book_gateway_core::error::GatewayError> {
        Err(book_gateway_core::error::GatewayError::ProviderUnavailable)
    }
}
