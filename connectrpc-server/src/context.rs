//! Common types for Connect RPC request handling.
//!
//! This module provides types used by both the [`ConnectLayer`] middleware
//! and request extensions, including protocol detection, timeout configuration,
//! message size limits, and compression negotiation.
//!
//! [`ConnectLayer`]: crate::layer::ConnectLayer

pub mod config;
pub mod envelope_compression;
pub mod error;
pub mod limit;
pub mod protocol;
mod request_context;
pub mod timeout;

pub use config::ServerConfig;
pub use envelope_compression::{
    CompressionConfig, CompressionEncoding, CompressionLevel, EnvelopeCompression,
    negotiate_response_encoding, parse_envelope_compression,
};
pub use limit::{DEFAULT_MAX_MESSAGE_SIZE, MessageLimits};
pub use protocol::{RequestProtocol, detect_protocol};
pub use request_context::{ConnectContext, RequestCompression};
pub use timeout::ConnectTimeout;
