//! Request descriptions for the ksqlDB REST API.
//!
//! A [`Resource`] describes one API call (method, endpoint, payload and
//! headers). It implements [`Requester`], which turns it into a
//! [`PreparedRequest`] given only the server URL. Building is pure: the
//! payload is serialized exactly once and no I/O happens.
//!
//! # Examples
//!
//! ```
//! use ksqldb_http::client::{Requester, Resource};
//! use url::Url;
//!
//! let server = Url::parse("http://localhost:8088").unwrap();
//! let request = Resource::statement("SHOW STREAMS;")
//!     .with_property("ksql.streams.auto.offset.reset", "earliest")
//!     .request(&server)
//!     .unwrap();
//!
//! assert_eq!(request.url().as_str(), "http://localhost:8088/ksql");
//! assert_eq!(request.method(), http::Method::POST);
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{KsqlError, Result};
use crate::protocol::{self, endpoint, Endpoint};

/// The JSON body of a statement or query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// The KSQL text.
    pub ksql: String,

    /// Session properties for the statement.
    #[serde(rename = "streamsProperties")]
    pub streams_properties: BTreeMap<String, String>,

    /// Wait until the server has executed at least this command sequence
    /// number before running the statement.
    #[serde(
        rename = "commandSequenceNumber",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub command_sequence_number: Option<i64>,
}

impl Payload {
    /// A payload with the given KSQL text and no properties.
    pub fn new(ksql: impl Into<String>) -> Self {
        Payload {
            ksql: ksql.into(),
            ..Default::default()
        }
    }
}

/// A fully built request, ready to hand to the transport.
///
/// Immutable once built: the hooks observe exactly what the builder
/// produced.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl PreparedRequest {
    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Absolute request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Serialized request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Convert into a transport request. The body bytes are shared, not copied.
    pub(crate) fn to_reqwest(&self) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        *request.body_mut() = Some(reqwest::Body::from(self.body.clone()));
        request
    }
}

/// Build a request from its parts.
///
/// Default headers are applied first and `headers` override them by
/// case-insensitive name.
///
/// # Errors
///
/// [`KsqlError::Serialization`] if the payload cannot be encoded,
/// [`KsqlError::InvalidRequest`] if the URL is not HTTP(S) or a header name
/// or value is not valid.
pub fn build_request<P>(
    method: Method,
    payload: &P,
    headers: &BTreeMap<String, String>,
    url: Url,
) -> Result<PreparedRequest>
where
    P: Serialize + ?Sized,
{
    let body = serde_json::to_vec(payload)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(KsqlError::InvalidRequest(format!(
            "unsupported URL scheme {:?} for {} {}",
            url.scheme(),
            method,
            url
        )));
    }

    let mut header_map = protocol::default_headers();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        header_map.insert(name, value);
    }

    Ok(PreparedRequest {
        method,
        url,
        headers: header_map,
        body: Bytes::from(body),
    })
}

/// A source of requests: anything that can describe itself as a request
/// against a server URL.
pub trait Requester {
    /// Build the request for the server at `server_url`.
    fn request(&self, server_url: &Url) -> Result<PreparedRequest>;
}

/// Everything needed to describe one ksqlDB REST API call.
#[derive(Debug, Clone)]
pub struct Resource {
    /// JSON body.
    pub payload: Payload,
    /// Target route.
    pub endpoint: Endpoint,
    /// HTTP method.
    pub method: Method,
    /// Header overrides, applied over the defaults.
    pub headers: BTreeMap<String, String>,
    /// API version the resource targets.
    pub api_version: String,
}

impl Resource {
    /// A KSQL statement, sent to the statement endpoint.
    pub fn statement(ksql: impl Into<String>) -> Self {
        Self::new(endpoint::RUN_STATEMENT, ksql)
    }

    /// A KSQL query (a `SELECT`), sent to the query endpoint.
    pub fn query(ksql: impl Into<String>) -> Self {
        Self::new(endpoint::RUN_QUERY, ksql)
    }

    /// A POST of `ksql` to an arbitrary endpoint.
    pub fn new(endpoint: Endpoint, ksql: impl Into<String>) -> Self {
        Resource {
            payload: Payload::new(ksql),
            endpoint,
            method: Method::POST,
            headers: BTreeMap::new(),
            api_version: protocol::API_VERSION.to_string(),
        }
    }

    /// Set a session property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.streams_properties.insert(key.into(), value.into());
        self
    }

    /// Set the command sequence number to wait for.
    pub fn with_sequence_number(mut self, seq: i64) -> Self {
        self.payload.command_sequence_number = Some(seq);
        self
    }

    /// Override or add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Override the HTTP method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

/// A resource encodes as its payload alone.
impl Serialize for Resource {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.payload.serialize(serializer)
    }
}

impl Requester for Resource {
    fn request(&self, server_url: &Url) -> Result<PreparedRequest> {
        build_request(
            self.method.clone(),
            self,
            &self.headers,
            self.endpoint.on(server_url),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{ACCEPT, CONTENT_TYPE};
    use serde::ser::Error as _;

    fn server() -> Url {
        Url::parse("http://localhost:8088").unwrap()
    }

    #[test]
    fn test_payload_json_shape() {
        let payload = Payload::new("SHOW STREAMS;");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "ksql": "SHOW STREAMS;", "streamsProperties": {} })
        );

        let payload = Resource::query("SELECT 1;")
            .with_property("a", "1")
            .with_sequence_number(42)
            .payload;
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["commandSequenceNumber"], 42);
        assert_eq!(json["streamsProperties"]["a"], "1");
    }

    #[test]
    fn test_resource_encodes_as_payload() {
        let resource = Resource::statement("SHOW TOPICS;")
            .with_header("X-Trace", "abc")
            .with_sequence_number(7);
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ksql": "SHOW TOPICS;",
                "streamsProperties": {},
                "commandSequenceNumber": 7
            })
        );

        let request = resource.request(&server()).unwrap();
        assert_eq!(request.body().as_ref(), serde_json::to_vec(&resource.payload).unwrap());
    }

    #[test]
    fn test_statement_request() {
        let request = Resource::statement("SHOW STREAMS;").request(&server()).unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().as_str(), "http://localhost:8088/ksql");
        assert_eq!(request.headers()[CONTENT_TYPE], protocol::CONTENT_TYPE_KSQL_V1);
        assert_eq!(request.headers()[ACCEPT], protocol::ACCEPT_KSQL_V1);

        let body: Payload = serde_json::from_slice(request.body()).unwrap();
        assert_eq!(body.ksql, "SHOW STREAMS;");
    }

    #[test]
    fn test_header_override_is_case_insensitive() {
        let request = Resource::query("SELECT 1;")
            .with_header("accept", "application/json")
            .with_header("X-Trace", "abc")
            .request(&server())
            .unwrap();

        assert_eq!(request.headers().get_all(ACCEPT).iter().count(), 1);
        assert_eq!(request.headers()[ACCEPT], "application/json");
        assert_eq!(request.headers()["x-trace"], "abc");
    }

    #[test]
    fn test_invalid_header_is_invalid_request() {
        let err = Resource::statement("SHOW TOPICS;")
            .with_header("bad header", "v")
            .request(&server())
            .unwrap_err();
        assert!(matches!(err, KsqlError::InvalidRequest(_)));
    }

    #[test]
    fn test_non_http_url_is_invalid_request() {
        let url = Url::parse("ftp://host/ksql").unwrap();
        let err =
            build_request(Method::POST, &Payload::new("x"), &BTreeMap::new(), url).unwrap_err();
        assert!(matches!(err, KsqlError::InvalidRequest(_)));
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("cannot encode"))
        }
    }

    #[test]
    fn test_serialization_error() {
        let err =
            build_request(Method::POST, &Unencodable, &BTreeMap::new(), server()).unwrap_err();
        assert!(matches!(err, KsqlError::Serialization(_)));
    }

    #[test]
    fn test_to_reqwest_keeps_parts() {
        let prepared = Resource::statement("LIST TOPICS;").request(&server()).unwrap();
        let request = prepared.to_reqwest();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url(), prepared.url());
        assert_eq!(request.headers(), prepared.headers());
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, &prepared.body()[..]);
    }
}
