use crate::http::headers::Headers;

/// The first line of a request: `METHOD TARGET HTTP/1.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// Uppercase ASCII letters only (e.g. "GET")
    pub method: String,
    /// Raw request target, not decoded (e.g. "/search?q=rust")
    pub target: String,
    /// Version number without the `HTTP/` prefix; always "1.1"
    pub http_version: String,
}

/// A fully parsed HTTP request.
///
/// Produced only by [`RequestParser`](crate::http::parser::RequestParser)
/// once it reaches `Done`; a request that failed to parse never surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Request {
    /// Retrieves a header value by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")
            .and_then(|v| v.parse().ok())
    }

    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    pub fn target(&self) -> &str {
        &self.request_line.target
    }
}
