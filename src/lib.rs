#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # ksqldb-http: a streaming client for the ksqlDB REST API
//!
//! This crate builds requests for KSQL statements and queries, dispatches them
//! over a pooled HTTP transport, and exposes results either as one buffered
//! payload or as a live stream of newline-delimited records.
//!
//! ## Overview
//!
//! Data flows in one direction:
//!
//! 1. **Endpoint resolution** - a fixed route is resolved against the server URL
//! 2. **Request building** - a [`Resource`] serializes its payload once into a [`PreparedRequest`]
//! 3. **Dispatch** - [`KsqlClient::execute`] sends it under a child of the client's root [`Scope`]
//! 4. **Streaming** - the returned [`Response`] lazily starts one reader task that frames the body into records
//!
//! ## Key Features
//!
//! - **Lazy, single reader**: the body is not touched until first consumed, and never read twice
//! - **Backpressure**: the reader waits for each record to be taken before scanning further
//! - **Scoped cancellation**: canceling a response never affects the client or other exchanges
//! - **Drain on termination**: clean ends, cancellations and deadlines deliver every buffered record
//! - **Lifecycle hooks**: observe the pristine request and the response head as soon as it arrives
//!
//! ## Usage
//!
//! ```ignore
//! use ksqldb_http::{ClientOptions, KsqlClient, Resource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KsqlClient::new(ClientOptions::new("http://localhost:8088"))?;
//!
//!     let response = client
//!         .execute(&Resource::query("SELECT * FROM transactions EMIT CHANGES;"))
//!         .await?;
//!
//!     response
//!         .read_streaming(|row| {
//!             println!("<< {}", String::from_utf8_lossy(&row));
//!             Ok(())
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[client]** - Client, request building, configuration and hooks
//! - **[response]** - The streaming response engine
//! - **[scope]** - Cancellation scopes
//! - **[protocol]** - Routes, media types and the record delimiter
//! - **[error]** - Error types and result handling

pub mod client;
pub mod error;
pub mod protocol;
pub mod response;
pub mod scope;

pub use client::{
    ClientConfig, ClientOptions, ClientTrace, KsqlClient, Payload, PreparedRequest, Requester,
    Resource,
};
pub use error::{KsqlError, Result};
pub use response::{RecordStream, Response, ResponseChannels, ResponseHead, StreamEnd};
pub use scope::{Scope, ScopeError};
