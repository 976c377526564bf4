//! Logical routes of the ksqlDB REST API and their resolution against a
//! server URL.

use std::fmt;

use url::Url;

/// Used to introspect query status.
pub const STATUS_QUERY: Endpoint = Endpoint::new("/status");

/// Used to introspect server status.
pub const STATUS_SERVER: Endpoint = Endpoint::new("/info");

/// Used to execute a statement.
pub const RUN_STATEMENT: Endpoint = Endpoint::new("/ksql");

/// Used to run a query.
pub const RUN_QUERY: Endpoint = Endpoint::new("/query");

/// Used to run push and pull queries.
pub const RUN_STREAM_QUERY: Endpoint = Endpoint::new("/query-stream");

/// Used to terminate a cluster.
pub const TERMINATE: Endpoint = Endpoint::new("/ksql/terminate");

/// A fixed relative reference naming one server operation.
///
/// The reference may carry a query and fragment (`/path?x=1#frag`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    reference: &'static str,
}

impl Endpoint {
    /// Create an endpoint from a relative reference.
    pub const fn new(reference: &'static str) -> Self {
        Endpoint { reference }
    }

    /// The relative reference as written.
    pub fn as_str(&self) -> &'static str {
        self.reference
    }

    /// Resolve this endpoint against `base`.
    ///
    /// Scheme and authority always come from `base`. A non-empty endpoint
    /// path replaces the base path; an empty one keeps it, along with the
    /// base query unless the endpoint has its own.
    pub fn on(&self, base: &Url) -> Url {
        let (rest, fragment) = match self.reference.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (self.reference, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let mut url = base.clone();
        if path.is_empty() {
            if query.is_some() {
                url.set_query(query);
            }
        } else {
            url.set_path(path);
            url.set_query(query);
        }
        url.set_fragment(fragment);
        url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_routes() {
        let base = Url::parse("http://host:8088").unwrap();
        let table = [
            (STATUS_QUERY, "http://host:8088/status"),
            (STATUS_SERVER, "http://host:8088/info"),
            (RUN_STATEMENT, "http://host:8088/ksql"),
            (RUN_QUERY, "http://host:8088/query"),
            (RUN_STREAM_QUERY, "http://host:8088/query-stream"),
            (TERMINATE, "http://host:8088/ksql/terminate"),
        ];
        for (endpoint, expected) in table {
            assert_eq!(endpoint.on(&base).as_str(), expected, "{endpoint}");
        }
    }

    #[test]
    fn test_route_path_replaces_base_path() {
        let base = Url::parse("https://user@host:8443/").unwrap();
        let url = RUN_QUERY.on(&base);
        assert_eq!(url.as_str(), "https://user@host:8443/query");
    }

    #[test]
    fn test_query_and_fragment() {
        let base = Url::parse("http://host:8088/?keep=1").unwrap();
        let url = Endpoint::new("/status?id=7#top").on(&base);
        assert_eq!(url.as_str(), "http://host:8088/status?id=7#top");

        let url = Endpoint::new("").on(&base);
        assert_eq!(url.as_str(), "http://host:8088/?keep=1");
    }
}
