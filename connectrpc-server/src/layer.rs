//! Middleware layer for Connect RPC protocol handling.
//!
//! The [`ConnectLayer`] middleware detects the protocol variant from incoming requests,
//! negotiates per-envelope compression, and stores a single [`ConnectContext`] in request
//! extensions so that extractors and handlers see the same settings the layer negotiated.

pub mod bridge;
mod timeout;

pub use bridge::{BridgeLayer, BridgeService};

use crate::context::{
    ConnectContext, RequestCompression, RequestProtocol, ServerConfig,
    protocol::{detect_protocol, validate_content_type, validate_protocol_version},
};
use crate::message::error::{Code, ConnectError};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use std::time::Duration;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service, ServiceExt};

/// Layer that wraps services with Connect protocol detection and context construction.
///
/// This layer:
/// 1. Detects the protocol variant from the request (Content-Type header or query params)
/// 2. Validates protocol version header (if configured)
/// 3. Negotiates per-envelope compression for streaming requests
/// 4. Builds a [`ConnectContext`] and stores it in request extensions
/// 5. Applies the effective request timeout (server vs. `Connect-Timeout-Ms`)
///
/// # Example
///
/// ```rust,ignore
/// use connectrpc_server::{ConnectLayer, MessageLimits};
///
/// // Use default 4 MB limit
/// let router = Router::new()
///     .route("/service/Method", post(handler))
///     .layer(ConnectLayer::new());
///
/// // Custom 16 MB limit with protocol header required
/// let router = Router::new()
///     .route("/service/Method", post(handler))
///     .layer(
///         ConnectLayer::new()
///             .limits(MessageLimits::new(16 * 1024 * 1024))
///             .require_protocol_header(true)
///     );
/// ```
///
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectLayer {
    config: ServerConfig,
}

impl ConnectLayer {
    /// Create a new ConnectLayer with default message limits (4 MB) and compression.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom message limits.
    pub fn limits(mut self, limits: crate::context::MessageLimits) -> Self {
        self.config = self.config.with_limits(limits);
        self
    }

    /// Set custom compression settings for streaming envelope negotiation.
    pub fn compression(mut self, config: crate::context::CompressionConfig) -> Self {
        self.config = self.config.with_compression(config);
        self
    }

    /// Require the `Connect-Protocol-Version` header on Connect protocol requests.
    ///
    /// When enabled, requests must include the `Connect-Protocol-Version: 1` header.
    /// This helps HTTP proxies and middleware identify valid Connect requests.
    ///
    /// Disabled by default to allow easy ad-hoc requests (e.g., with cURL).
    pub fn require_protocol_header(mut self, require: bool) -> Self {
        if require {
            self.config = self.config.require_protocol_header();
        }
        self
    }

    /// Set the server-side maximum timeout.
    ///
    /// When set, the effective timeout for each request is the minimum of:
    /// - This server timeout
    /// - The client's `Connect-Timeout-Ms` header (if present)
    ///
    /// This ensures the smaller timeout always wins, matching Connect-Go's behavior.
    /// On timeout, a Connect `deadline_exceeded` error is returned.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use std::time::Duration;
    /// use connectrpc_server::ConnectLayer;
    ///
    /// let layer = ConnectLayer::new()
    ///     .timeout(Duration::from_secs(30));
    /// ```
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }
}

impl<S> Layer<S> for ConnectLayer {
    type Service = ConnectService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConnectService {
            inner,
            config: self.config,
        }
    }
}

/// Service wrapper that provides per-request [`ConnectContext`].
#[derive(Debug, Clone)]
pub struct ConnectService<S> {
    inner: S,
    config: ServerConfig,
}

impl<S, ReqBody> Service<Request<ReqBody>> for ConnectService<S>
where
    S: Service<Request<ReqBody>, Response = Response> + Clone + Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Detect protocol from request.
        let protocol = detect_protocol(&req);

        // Validate for POST requests:
        // - Content-Type is a known Connect protocol type
        // - Protocol version header (if configured)
        // GET requests use ?connect=v1 query param, validated in request.rs
        if *req.method() == Method::POST {
            if let Some(err) = validate_content_type(protocol) {
                let response = err.into_response_with_protocol(protocol);
                return Box::pin(async move { Ok(response) });
            }

            if let Some(err) =
                validate_protocol_version(&req, self.config.require_protocol_header)
            {
                let response = err.into_response_with_protocol(protocol);
                return Box::pin(async move { Ok(response) });
            }
        }

        // Negotiate per-envelope compression for streaming requests.
        let envelope = match crate::context::parse_envelope_compression(
            &req,
            protocol.needs_envelope(),
        ) {
            Ok(envelope) => envelope,
            Err(err) => {
                let response = err.into_response_with_protocol(protocol);
                return Box::pin(async move { Ok(response) });
            }
        };

        let ctx = ConnectContext {
            protocol,
            limits: self.config.limits,
            compression: RequestCompression {
                config: self.config.compression,
                envelope,
            },
        };
        req.extensions_mut().insert(ctx);

        // Parse Connect-Timeout-Ms header and compute effective timeout
        let client_timeout = timeout::parse_timeout(&req);
        let effective_timeout =
            timeout::compute_effective_timeout(self.config.server_timeout, client_timeout);

        // The request method, needed after `req` is moved into the inner call, to
        // word the "method not allowed" error the same way Connect's own servers do.
        let method = req.method().clone();

        // Clone inner service for the async block
        let inner = self.inner.clone();
        // Replace self.inner with the clone so it's ready for the next request
        let inner = std::mem::replace(&mut self.inner, inner);

        Box::pin(async move {
            // Apply timeout if configured
            let result = match effective_timeout.duration() {
                Some(duration) => {
                    match tokio::time::timeout(duration, inner.oneshot(req)).await {
                        Ok(result) => result,
                        Err(_elapsed) => {
                            // Timeout exceeded - return Connect deadline_exceeded error
                            let err = ConnectError::new(
                                Code::DeadlineExceeded,
                                "request timeout exceeded",
                            );
                            Ok(err.into_response_with_protocol(protocol))
                        }
                    }
                }
                None => inner.oneshot(req).await,
            };

            result.map(|response| rewrite_routing_error(response, protocol, &method))
        })
    }
}

/// Axum's router returns its own bare 404/405 responses for an unknown path or
/// a method the endpoint doesn't accept. Rewrite those into Connect-shaped
/// `unimplemented` responses (501, with an `Allow` header for the 405 case) so
/// every error the dispatcher can produce, routing included, is one a Connect
/// client can decode.
fn rewrite_routing_error(response: Response, protocol: RequestProtocol, method: &Method) -> Response {
    match response.status() {
        StatusCode::NOT_FOUND => ConnectError::new_unimplemented().into_response_with_protocol(protocol),
        StatusCode::METHOD_NOT_ALLOWED => {
            let allow = response.headers().get(header::ALLOW).cloned();
            let mut rewritten = ConnectError::new(Code::Unimplemented, format!("{method} not allowed"))
                .into_response_with_protocol(protocol);
            if let Some(allow) = allow {
                rewritten.headers_mut().insert(header::ALLOW, allow);
            }
            rewritten
        }
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::post;
    use axum::{Router, http::header::CONTENT_TYPE};
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn unknown_path_becomes_unimplemented() {
        let app: Router = Router::new()
            .route("/pkg.Svc/Known", post(ok_handler))
            .layer(ConnectLayer::new());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/pkg.Svc/Unknown")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "unimplemented");
    }

    #[tokio::test]
    async fn wrong_method_becomes_unimplemented_with_allow_header() {
        let app: Router = Router::new()
            .route("/pkg.Svc/Known", post(ok_handler))
            .layer(ConnectLayer::new());

        let req = Request::builder()
            .method(Method::GET)
            .uri("/pkg.Svc/Known")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(
            resp.headers().get(header::ALLOW).unwrap().to_str().unwrap(),
            "POST"
        );

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "unimplemented");
        assert_eq!(json["message"], "GET not allowed");
    }
}
