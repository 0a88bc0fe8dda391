//! # Connect RPC for Axum
//!
//! A library for building [Connect](https://connectrpc.com/) RPC services with
//! [Axum](https://github.com/tokio-rs/axum).
//!
//! This crate provides a set of tools to build Connect-compliant RPC services that
//! feel idiomatic to Axum developers. It uses standard Axum extractors, response
//! types, and a compile-time route generator to integrate seamlessly into existing
//! Axum applications.
//!
//! ## Features
//!
//! - **Compile-time Route Generation:** `connectrpc-build` generates a router builder
//!   from your `.proto` files, ensuring your routes are always in sync with your
//!   service definitions.
//! - **Axum-native:** Handlers are standard `async fn` that use `axum::extract::FromRequest`
//!   and a context-aware response encoder.
//! - **Unary and streaming:** Supports unary, server-streaming, client-streaming and
//!   bidirectional-streaming RPCs.
//! - **Error handling:** Provides a `ConnectError` type that automatically maps to
//!   Connect-compliant error responses.
//!
//! ## Getting Started
//!
//! Check out the `README.md` file for a comprehensive guide on how to get started.

pub mod context;
pub mod handler;
pub mod layer;
pub mod message;
pub mod service_builder;

pub mod error {
    //! Re-exports of the Connect error types, for handlers that only need errors.
    pub use crate::message::error::{Code, ConnectError};
}

// Re-export several crates used by generated code and handler signatures.
pub use futures;
pub use pbjson;
pub use pbjson_types;
pub use prost;
pub use serde;

pub use context::{ConnectContext, ConnectTimeout, DEFAULT_MAX_MESSAGE_SIZE, MessageLimits};
pub use handler::IdempotencyLevel;
pub use layer::{BridgeLayer, BridgeService, ConnectLayer, ConnectService};
pub use service_builder::MakeServiceBuilder;

pub mod prelude {
    //! A prelude for `connectrpc-server` providing the most common types.
    pub use crate::context::ConnectContext;
    pub use crate::handler::{ConnectHandler, ConnectService, connect_service};
    pub use crate::message::error::{Code, ConnectError};
    pub use crate::message::{ConnectRequest, ConnectResponse, StreamBody, Streaming};
}
