//! Response handling modules for Connect RPC client.
//!
//! This module contains response-side types and decoding:
//! - [`ConnectResponse`]: Response wrapper with metadata
//! - [`Metadata`]: HTTP headers wrapper
//! - [`Streaming`]: Streaming response wrapper
//! - [`FrameDecoder`]: Decodes Connect protocol envelope frames

mod decoder;
mod streaming;
mod types;

pub use decoder::FrameDecoder;
pub use streaming::Streaming;
pub use types::{ConnectResponse, Metadata};
