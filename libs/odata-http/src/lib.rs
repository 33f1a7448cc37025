#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP client used by the `OData` entity service
//!
//! A hyper-based client with:
//! - Automatic TLS via rustls (HTTPS only by default)
//! - Connection pooling
//! - Per-request timeout
//! - Transparent response decompression (gzip, brotli, deflate)
//! - Body size limits applied to decompressed bytes
//!
//! The client never retries; failures surface to the caller unchanged.
//!
//! # Example
//!
//! ```ignore
//! use odata_http::HttpClient;
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .user_agent("my-app/1.0")
//!     .build()?;
//!
//! let products: Option<serde_json::Value> = client
//!     .get("https://example.com/odata/Products")
//!     .query("$top", "10")
//!     .send()
//!     .await?
//!     .json_opt()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod request;
mod response;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TransportSecurity};
pub use error::{HttpError, InvalidUriKind};
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse, ResponseBody};
