//! Per-request context assembled by [`ConnectLayer`](crate::layer::ConnectLayer) and
//! consumed by the request/response pipelines.
//!
//! A single [`ConnectContext`] is stored as a request extension so that extractors
//! and handler wrappers see the same protocol, limits and compression settings that
//! the middleware negotiated, instead of re-deriving them from headers.

use super::envelope_compression::{CompressionConfig, EnvelopeCompression};
use super::limit::MessageLimits;
use super::protocol::RequestProtocol;

/// Compression settings resolved for the current request.
///
/// `envelope` is `None` for unary RPCs, where HTTP body compression is handled by
/// Tower's `CompressionLayer` instead of per-message framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestCompression {
    /// Server-wide compression configuration (threshold, level).
    pub config: CompressionConfig,
    /// Negotiated per-envelope compression, present only for streaming RPCs.
    pub envelope: Option<EnvelopeCompression>,
}

/// Context describing how to decode the current request and encode its response.
///
/// Built once by [`ConnectLayer`](crate::layer::ConnectLayer) and stored in request
/// extensions. Falls back to a best-effort default (see
/// [`get_context_or_default`](crate::message::request::get_context_or_default)) when
/// the layer was not applied.
#[derive(Debug, Clone, Default)]
pub struct ConnectContext {
    /// Wire protocol variant detected for this request.
    pub protocol: RequestProtocol,
    /// Message size limits to enforce on request/response bodies.
    pub limits: MessageLimits,
    /// Compression settings negotiated for this request.
    pub compression: RequestCompression,
}

impl ConnectContext {
    /// Build a context for the given protocol with default limits and compression.
    pub fn new(protocol: RequestProtocol) -> Self {
        Self {
            protocol,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_has_no_envelope_compression() {
        let ctx = ConnectContext::default();
        assert!(ctx.compression.envelope.is_none());
        assert_eq!(ctx.protocol, RequestProtocol::ConnectUnaryJson);
    }

    #[test]
    fn new_sets_protocol() {
        let ctx = ConnectContext::new(RequestProtocol::ConnectStreamProto);
        assert_eq!(ctx.protocol, RequestProtocol::ConnectStreamProto);
    }
}
