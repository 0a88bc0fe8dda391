//! Connect-Timeout-Ms parsing and computation.
//!
//! This module provides support for the Connect protocol's timeout mechanism.
//! Clients can set a `Connect-Timeout-Ms` header to specify how long they're
//! willing to wait for a response.

use axum::http::Request;
use std::time::Duration;

/// Header name for Connect timeout in milliseconds.
pub const CONNECT_TIMEOUT_MS_HEADER: &str = "connect-timeout-ms";

// ============================================================================
// ConnectTimeout (backwards compatibility)
// ============================================================================

/// Timeout configuration extracted from the Connect-Timeout-Ms header.
///
/// This is stored in request extensions by [`ConnectLayer`](crate::ConnectLayer)
/// and can be used by handlers to enforce request timeouts.
///
/// # Example
///
/// ```rust,ignore
/// use connectrpc_server::ConnectTimeout;
///
/// async fn handler(
///     timeout: Option<Extension<ConnectTimeout>>,
///     req: ConnectRequest<MyRequest>,
/// ) -> Result<ConnectResponse<MyResponse>, ConnectError> {
///     if let Some(Extension(timeout)) = timeout {
///         if let Some(duration) = timeout.duration() {
///             // Apply timeout to your operation
///         }
///     }
///     // ...
/// }
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectTimeout {
    /// The timeout duration, if specified and valid.
    duration: Option<Duration>,
}

impl ConnectTimeout {
    /// Create a new ConnectTimeout with the specified duration.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
        }
    }

    /// Create a ConnectTimeout representing no timeout (unlimited).
    pub fn none() -> Self {
        Self { duration: None }
    }

    /// Returns the timeout duration, or `None` if no timeout was specified.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Parse the Connect-Timeout-Ms header value.
    ///
    /// Returns `Some(ConnectTimeout)` with the parsed duration if the value is valid,
    /// or `None` if the header was not present or the value was invalid.
    ///
    /// Per the Connect spec, the value must be a non-negative integer representing
    /// milliseconds. Values of 0 mean "no timeout" (unlimited time).
    pub fn parse(value: &str) -> Option<Self> {
        let ms: u64 = value.parse().ok()?;
        if ms == 0 {
            // 0 means no timeout per Connect spec
            Some(Self::none())
        } else {
            Some(Self::new(Duration::from_millis(ms)))
        }
    }
}

impl Default for ConnectTimeout {
    fn default() -> Self {
        Self::none()
    }
}

// ============================================================================
// Parsing functions
// ============================================================================

/// Parse the Connect-Timeout-Ms header from a request.
///
/// Returns `Some(Duration)` if the header is present and valid,
/// or `None` if the header is missing, invalid, or zero (which means no timeout per Connect spec).
pub fn parse_timeout<B>(req: &Request<B>) -> Option<Duration> {
    req.headers()
        .get(CONNECT_TIMEOUT_MS_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_timeout_ms)
}

/// Parse a timeout milliseconds string.
///
/// Returns `Some(Duration)` for valid positive values,
/// or `None` for invalid values or 0 (which means no timeout per Connect spec).
pub fn parse_timeout_ms(value: &str) -> Option<Duration> {
    let ms: u64 = value.parse().ok()?;
    if ms == 0 {
        // 0 means no timeout per Connect spec
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

/// Compute the effective timeout from server and client timeouts.
///
/// The effective timeout is the minimum of the two, matching Connect-Go's behavior
/// where the smaller timeout always wins.
///
/// Returns `None` if neither timeout is set (unlimited).
pub fn compute_effective_timeout(
    server_timeout: Option<Duration>,
    client_timeout: Option<Duration>,
) -> Option<Duration> {
    match (server_timeout, client_timeout) {
        // Both set: use the smaller
        (Some(server), Some(client)) => Some(server.min(client)),
        // Only one set
        (Some(server), None) => Some(server),
        (None, Some(client)) => Some(client),
        // Neither set
        (None, None) => None,
    }
}
