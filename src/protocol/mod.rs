//! ksqlDB REST API protocol constants.
//!
//! This module holds the fixed parts of the wire protocol: the routes the
//! server exposes, the versioned media type sent on every request, and the
//! delimiter that separates streamed records.
//!
//! # Routes
//!
//! | Constant | Path | Purpose |
//! |----------|------|---------|
//! | [`endpoint::STATUS_QUERY`] | `/status` | Query status |
//! | [`endpoint::STATUS_SERVER`] | `/info` | Server status |
//! | [`endpoint::RUN_STATEMENT`] | `/ksql` | Run a statement |
//! | [`endpoint::RUN_QUERY`] | `/query` | Run a query |
//! | [`endpoint::RUN_STREAM_QUERY`] | `/query-stream` | Run push and pull queries |
//! | [`endpoint::TERMINATE`] | `/ksql/terminate` | Terminate a cluster |
//!
//! # Examples
//!
//! ```
//! use ksqldb_http::protocol::endpoint;
//! use url::Url;
//!
//! let base = Url::parse("http://host:8088").unwrap();
//! assert_eq!(endpoint::RUN_STATEMENT.on(&base).as_str(), "http://host:8088/ksql");
//! ```

pub mod endpoint;
pub mod headers;

pub use endpoint::Endpoint;
pub use headers::{default_headers, ACCEPT_KSQL_V1, CONTENT_TYPE_KSQL_V1};

/// Delimiter between records of a streaming response.
pub const RECORD_DELIMITER: u8 = b'\n';

/// API version spoken by this client.
pub const API_VERSION: &str = "v1";
