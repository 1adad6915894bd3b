//! HTTP transport
//!
//! Provides the timed HTTP client used by the request invoker.

mod client;

pub use client::HttpClient;
