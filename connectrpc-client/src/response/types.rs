//! Response metadata and the typed response wrapper.

use http::HeaderMap;

/// Headers (or trailers) returned alongside a response.
///
/// Wraps an [`http::HeaderMap`] with a read-only API suited to inspecting
/// response headers and EndStream trailers.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    headers: HeaderMap,
}

impl Metadata {
    /// Wrap a header map.
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Get the first value for a header name, as a `&str`.
    ///
    /// Returns `None` if the header is absent or its value isn't valid UTF-8.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Iterate over all values for a header name, as `&str`.
    ///
    /// Values that aren't valid UTF-8 are skipped.
    pub fn get_all(&self, name: &str) -> impl Iterator<Item = &str> {
        self.headers.get_all(name).iter().filter_map(|v| v.to_str().ok())
    }

    /// Check whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Get the underlying header map.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Consume and return the underlying header map.
    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }
}

/// A response message paired with the headers it arrived with.
///
/// Returned from every `ConnectClient` call. For unary calls the inner value
/// is the decoded response message; for streaming calls it's a `Streaming<..>`
/// that yields messages one at a time.
#[derive(Debug, Clone)]
pub struct ConnectResponse<T> {
    message: T,
    metadata: Metadata,
}

impl<T> ConnectResponse<T> {
    /// Wrap a message with its response metadata.
    pub fn new(message: T, metadata: Metadata) -> Self {
        Self { message, metadata }
    }

    /// Get the response headers.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Get a reference to the inner message.
    pub fn get_ref(&self) -> &T {
        &self.message
    }

    /// Consume the wrapper, discarding headers, and return the inner message.
    pub fn into_inner(self) -> T {
        self.message
    }

    /// Consume the wrapper, returning the message and its metadata.
    pub fn into_parts(self) -> (T, Metadata) {
        (self.message, self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_get_and_get_all() {
        let mut headers = HeaderMap::new();
        headers.append("x-custom", "value1".parse().unwrap());
        headers.append("x-custom", "value2".parse().unwrap());

        let metadata = Metadata::new(headers);
        assert_eq!(metadata.get("x-custom"), Some("value1"));
        assert_eq!(
            metadata.get_all("x-custom").collect::<Vec<_>>(),
            vec!["value1", "value2"]
        );
        assert!(metadata.contains("x-custom"));
        assert!(!metadata.contains("missing"));
    }

    #[test]
    fn connect_response_into_inner() {
        let response = ConnectResponse::new(42u32, Metadata::new(HeaderMap::new()));
        assert_eq!(*response.get_ref(), 42);
        assert_eq!(response.into_inner(), 42);
    }
}
