use crate::http::headers::Headers;
use crate::http::writer::WriteError;

/// HTTP status codes the writer can frame.
///
/// - `Ok` (200): Request successful
/// - `BadRequest` (400): Malformed request
/// - `InternalServerError` (500): Server error
///
/// Anything else is rejected by `TryFrom<u16>` rather than written as an
/// empty status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use rawhttp::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = WriteError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(StatusCode::Ok),
            400 => Ok(StatusCode::BadRequest),
            500 => Ok(StatusCode::InternalServerError),
            _ => Err(WriteError::UnsupportedStatus { code }),
        }
    }
}

/// The header set for a plain-text response of `content_len` bytes on a
/// connection that closes afterwards.
pub fn default_headers(content_len: usize) -> Headers {
    Headers::from_iter([
        ("Content-Length", content_len.to_string()),
        ("Connection", "close".to_string()),
        ("Content-Type", "text/plain".to_string()),
    ])
}

/// A failure a handler wants reported to the client as a complete
/// plain-text response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub status: StatusCode,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InternalServerError, message)
    }
}
