//! # prtgwatch-client
//!
//! Cached client for a PRTG server's table, status and historic-data API.
//!
//! The server does not use one envelope across endpoints, so every response
//! goes through [`response::process_response`] before the client picks out
//! the collection it asked for. Responses are cached per request URL for a
//! configurable time.
//!
//! ## Modules
//!
//! - [`client`]: [`ApiClient`] and its builder - suggest, info, history,
//!   messages and connectivity checks
//! - [`cache`]: the expiring key/value store in front of upstream calls
//! - [`response`]: ordered unwrapping rules for response envelopes
//! - [`models`]: typed table rows and historical responses
//! - [`time`]: averaging buckets and the server's date formats
//! - [`transport`]: the HTTP seam ([`ReqwestTransport`], [`StaticTransport`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prtgwatch_client::{ApiClient, QueryItem};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::builder()
//!         .hostname("prtg.example.com")
//!         .credentials("prtgadmin", "1234567890")
//!         .cache_timeout_secs(60)
//!         .build()?;
//!
//!     let sensor = client.sensor_info("Ping").await?;
//!     let now = 1_709_287_509_000;
//!     let history = client
//!         .historical_data(now - 6 * 3_600_000, now, &[QueryItem::new(sensor.objid, "*")])
//!         .await?;
//!
//!     println!("{} samples", history.histdata.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod models;
pub mod response;
pub mod time;
pub mod transport;

pub use cache::{Cache, CacheItem};
pub use client::{ApiClient, ApiClientBuilder, Endpoint, ValueLookup, UNKNOWN_VERSION};
pub use error::ClientError;
pub use models::{
    Channel, Device, Group, HistoricalResponse, MessageEntry, Named, Properties, QueryItem, Sensor,
};
pub use transport::{HttpResponse, ReqwestTransport, StaticTransport, Transport};
