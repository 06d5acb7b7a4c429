//! Response header hardening. This gateway only ever answers with a JSON
//! envelope or an upgraded WebSocket stream, so the policy here is the
//! strictest one available: no embedding, no scripts, no inline content of
//! any kind, and a permissions policy that disables every browser feature
//! a book-metadata API has no legitimate reason to touch.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};

const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";
const CSP_VALUE: &str = "default-src 'none'; frame-ancestors 'none'";
const PERMISSIONS_POLICY_VALUE: &str =
    "geolocation=(), microphone=(), camera=(), payment=(), usb=(), interest-cohort=()";

pub struct SecurityHeaders;

impl<S, B> Transform<S, ServiceRequest> for SecurityHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersMiddleware { service }))
    }
}

pub struct SecurityHeadersMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for SecurityHeadersMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let fut = self.service.call(req);

        Box::pin(async move {
            let mut res = fut.await?;
            apply_hardening_headers(res.headers_mut());
            Ok(res)
        })
    }
}

/// Stamps the fixed set of hardening headers onto a response. Pulled out of
/// `call` so the header set itself is testable without spinning up a
/// service chain.
fn apply_hardening_headers(headers: &mut actix_web::http::header::HeaderMap) {
    headers.insert(
        actix_web::http::header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static(HSTS_VALUE),
    );
    headers.insert(
        actix_web::http::header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        actix_web::http::header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        actix_web::http::header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CSP_VALUE),
    );
    headers.insert(
        actix_web::http::header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(PERMISSIONS_POLICY_VALUE),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    async fn json_envelope_handler() -> HttpResponse {
        HttpResponse::Ok().json(serde_json::json!({ "ok": true }))
    }

    #[actix_web::test]
    async fn json_responses_get_the_full_hardening_set() {
        let app = test::init_service(
            App::new()
                .wrap(SecurityHeaders)
                .route("/works", web::get().to(json_envelope_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/works").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.headers().contains_key("strict-transport-security"));
        assert!(resp.headers().contains_key("x-frame-options"));
        assert!(resp.headers().contains_key("x-content-type-options"));
        assert!(resp.headers().contains_key("content-security-policy"));
        assert!(resp.headers().contains_key("referrer-policy"));
        assert!(resp.headers().contains_key("permissions-policy"));
    }

    #[actix_web::test]
    async fn content_security_policy_denies_all_embedding() {
        let app = test::init_service(
            App::new()
                .wrap(SecurityHeaders)
                .route("/works", web::get().to(json_envelope_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/works").to_request();
        let resp = test::call_service(&app, req).await;

        let csp = resp
            .headers()
            .get("content-security-policy")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(csp.contains("default-src 'none'"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }

    #[actix_web::test]
    async fn permissions_policy_disables_unused_browser_features() {
        let app = test::init_service(
            App::new()
                .wrap(SecurityHeaders)
                .route("/works", web::get().to(json_envelope_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/works").to_request();
        let resp = test::call_service(&app, req).await;

        let policy = resp
            .headers()
            .get("permissions-policy")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(policy.contains("camera=()"));
        assert!(policy.contains("interest-cohort=()"));
    }
}
