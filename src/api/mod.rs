//! Remote API Module
//!
//! HTTP access to the CDN control plane.
//!
//! - [`client`]: Authenticated request/response client

pub mod client;

pub use client::{ApiClient, ApiRequest, HttpMethod, DEFAULT_API_URL};
