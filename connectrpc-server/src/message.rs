//! Message types for Connect RPC request and response handling.

pub mod error;
pub mod request;
pub mod response;

pub use request::{ConnectRequest, Streaming};
pub use response::{ConnectResponse, StreamBody};
