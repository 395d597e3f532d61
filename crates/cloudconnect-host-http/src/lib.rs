//! HTTP client capability for CloudConnect.
//!
//! Jobs only see the [`HttpClient`] trait: a request goes in, a
//! [`Response`] or a typed [`HttpError`] comes out. Retry, TLS and proxy
//! handling belong to the implementation; [`ReqwestClient`] is the default
//! one and takes an opaque [`ProxyConfig`] at construction.

mod client;
mod error;
mod types;

pub use client::{HttpClient, ProxyConfig, ReqwestClient};
pub use error::HttpError;
pub use types::{Request, Response};
