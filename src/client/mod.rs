//! ksqlDB HTTP client.
//!
//! This module turns request descriptions into in-flight exchanges:
//!
//! - **Build** a [`PreparedRequest`] from a [`Requester`] (usually a
//!   [`Resource`]) and the server URL, with no I/O
//! - **Dispatch** it through a pooled, uncompressed transport under a child of
//!   the client's root [`Scope`](crate::scope::Scope)
//! - **Instrument** each exchange with optional [`ClientTrace`] hooks
//! - **Return** a [`Response`](crate::response::Response) handle over the live
//!   body
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── fetch    - KsqlClient and dispatch
//! ├── resource - Payload, Resource, PreparedRequest, request building
//! ├── config   - ClientConfig, ClientOptions, URL validation
//! └── trace    - Lifecycle hooks
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`KsqlClient`] | The client |
//! | [`Resource`] | A statement or query description |
//! | [`PreparedRequest`] | A built, immutable request |
//! | [`ClientOptions`] | Construction options |
//! | [`ClientTrace`] | Lifecycle hooks |
//!
//! # Examples
//!
//! ```
//! use ksqldb_http::client::{ClientOptions, ClientTrace, KsqlClient};
//!
//! let trace = ClientTrace::new().on_request_prepared(|req| println!("> {}", req.url()));
//! let options = ClientOptions::new("http://localhost:8088").with_trace(trace);
//! let client = KsqlClient::new(options).unwrap();
//! assert_eq!(client.server_url().as_str(), "http://localhost:8088/");
//!
//! assert!(KsqlClient::new(ClientOptions::new("http://localhost:8088/path")).is_err());
//! ```

mod config;
mod fetch;
mod resource;
mod trace;

pub use config::{validate_server_url, ClientConfig, ClientOptions, DEFAULT_MAX_RECORD_LEN};
pub use fetch::KsqlClient;
pub use resource::{build_request, Payload, PreparedRequest, Requester, Resource};
pub use trace::{ClientTrace, RequestPreparedHook, ResponseDeliveredHook};
