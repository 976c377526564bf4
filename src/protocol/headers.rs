//! Media types and default request headers.
//!
//! Every request carries the versioned ksqlDB JSON media type on both
//! `Content-Type` and `Accept`, unless a resource overrides them.
//!
//! # Examples
//!
//! ```
//! use ksqldb_http::protocol::{default_headers, ACCEPT_KSQL_V1};
//! use http::header::ACCEPT;
//!
//! let headers = default_headers();
//! assert_eq!(headers[ACCEPT], ACCEPT_KSQL_V1);
//! ```

use http::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};

/// `Content-Type` sent with every request body.
pub const CONTENT_TYPE_KSQL_V1: &str = "application/vnd.ksql.v1+json; charset=utf-8";

/// `Accept` sent with every request.
pub const ACCEPT_KSQL_V1: &str = "application/vnd.ksql.v1+json";

/// The default header pair attached to every request.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(2);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_KSQL_V1));
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_KSQL_V1));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers() {
        let headers = default_headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[CONTENT_TYPE], CONTENT_TYPE_KSQL_V1);
        assert_eq!(headers["accept"], ACCEPT_KSQL_V1);
    }
}
