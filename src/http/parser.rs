use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::headers::{find_crlf, HeaderError, Headers};
use crate::http::request::{Request, RequestLine};

/// Starting size of the driver's read buffer; doubled whenever it fills.
const INITIAL_BUFFER_SIZE: usize = 8;

const CRLF_LEN: usize = 2;

const SUPPORTED_VERSION: &str = "1.1";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request line: {line:?}")]
    MalformedRequestLine { line: String },

    #[error("unsupported http version: {version}")]
    UnsupportedVersion { version: String },

    #[error("invalid method: {method:?}")]
    InvalidMethod { method: String },

    #[error("invalid header: {source}")]
    Header {
        #[from]
        source: HeaderError,
    },

    #[error("invalid content-length: {value:?}")]
    InvalidContentLength { value: String },

    #[error("request body is longer than content-length {declared}")]
    BodyTooLong { declared: usize },

    #[error("request body is shorter than content-length {declared}, received {received}")]
    BodyTooShort { declared: usize, received: usize },

    #[error("request body present without content-length")]
    UnexpectedBody,

    #[error("stream ended before the request line was complete")]
    IncompleteRequestLine,

    #[error("stream ended before the header section was complete")]
    IncompleteHeaders,

    #[error("io error while reading request: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("parse called after the request was complete")]
    AlreadyDone,

    #[error("request taken while parser was still {state:?}")]
    NotDone { state: ParserState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Initialized,
    ParsingHeaders,
    ParsingBody,
    Done,
}

/// Incremental HTTP/1.1 request parser.
///
/// Feed it the unconsumed tail of the stream with [`parse`](Self::parse);
/// it reports how many bytes it took. Bytes it did not take must be offered
/// again, followed by whatever arrives next.
#[derive(Debug)]
pub struct RequestParser {
    state: ParserState,
    request_line: Option<RequestLine>,
    headers: Headers,
    body: Vec<u8>,
    content_length: Option<usize>,
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Initialized,
            request_line: None,
            headers: Headers::new(),
            body: Vec::new(),
            content_length: None,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    /// Consumes as much of `buf` as the current state allows.
    ///
    /// `Ok(0)` while not `Done` means more data is needed.
    pub fn parse(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        if self.state == ParserState::Done {
            return Err(ParseError::AlreadyDone);
        }

        let mut consumed = 0;
        while self.state != ParserState::Done {
            let n = self.parse_single(&buf[consumed..])?;
            if n == 0 {
                break;
            }
            consumed += n;
        }

        Ok(consumed)
    }

    fn parse_single(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        match self.state {
            ParserState::Initialized => {
                let Some((request_line, n)) = parse_request_line(buf)? else {
                    return Ok(0);
                };
                self.request_line = Some(request_line);
                self.state = ParserState::ParsingHeaders;
                Ok(n)
            }

            ParserState::ParsingHeaders => {
                let (n, done) = self.headers.parse_one(buf)?;
                if !done {
                    return Ok(n);
                }
                self.content_length = declared_content_length(&self.headers)?;
                self.state = ParserState::ParsingBody;
                // the blank line ending the header section
                Ok(CRLF_LEN)
            }

            ParserState::ParsingBody => self.parse_body(buf),

            ParserState::Done => Err(ParseError::AlreadyDone),
        }
    }

    fn parse_body(&mut self, buf: &[u8]) -> Result<usize, ParseError> {
        let Some(declared) = self.content_length else {
            if !buf.is_empty() {
                return Err(ParseError::UnexpectedBody);
            }
            self.state = ParserState::Done;
            return Ok(0);
        };

        if self.body.len() + buf.len() > declared {
            return Err(ParseError::BodyTooLong { declared });
        }

        self.body.extend_from_slice(buf);
        if self.body.len() == declared {
            self.state = ParserState::Done;
        }

        Ok(buf.len())
    }

    /// Hands over the parsed request. Only valid once `Done`.
    pub fn into_request(self) -> Result<Request, ParseError> {
        match (self.state, self.request_line) {
            (ParserState::Done, Some(request_line)) => Ok(Request {
                request_line,
                headers: self.headers,
                body: self.body,
            }),
            (state, _) => Err(ParseError::NotDone { state }),
        }
    }

    /// Error to report when the stream ended and no further progress is possible.
    fn end_of_stream_error(&self) -> Option<ParseError> {
        match self.state {
            ParserState::Initialized => Some(ParseError::IncompleteRequestLine),
            ParserState::ParsingHeaders => Some(ParseError::IncompleteHeaders),
            ParserState::ParsingBody => Some(ParseError::BodyTooShort {
                declared: self.content_length.unwrap_or(0),
                received: self.body.len(),
            }),
            ParserState::Done => None,
        }
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads one request from `reader`, however the bytes happen to be split
/// across reads.
///
/// Bytes the parser has not consumed are shifted to the front of the buffer
/// and offered again after the next read; the buffer doubles when full.
/// Reaching end of stream is not itself an error, only failing to make
/// progress afterwards is.
pub async fn read_request<R>(reader: &mut R) -> Result<Request, ParseError>
where
    R: AsyncRead + Unpin,
{
    let mut parser = RequestParser::new();
    let mut buf = vec![0u8; INITIAL_BUFFER_SIZE];
    let mut filled = 0;
    let mut exhausted = false;

    while !parser.is_done() {
        if filled == buf.len() {
            buf.resize(buf.len() * 2, 0);
        }

        if !exhausted {
            let n = reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                exhausted = true;
            }
            filled += n;
        }

        let consumed = parser.parse(&buf[..filled])?;

        if exhausted && consumed == 0 {
            if let Some(e) = parser.end_of_stream_error() {
                return Err(e);
            }
        }

        buf.copy_within(consumed..filled, 0);
        filled -= consumed;
    }

    parser.into_request()
}

fn parse_request_line(buf: &[u8]) -> Result<Option<(RequestLine, usize)>, ParseError> {
    let Some(line_end) = find_crlf(buf) else {
        return Ok(None);
    };

    let raw = &buf[..line_end];
    let malformed = || ParseError::MalformedRequestLine {
        line: String::from_utf8_lossy(raw).into_owned(),
    };

    let line = std::str::from_utf8(raw).map_err(|_| malformed())?;
    let parts: Vec<&str> = line.split(' ').collect();

    let &[method, target, version] = parts.as_slice() else {
        return Err(malformed());
    };
    if method.is_empty() || target.is_empty() {
        return Err(malformed());
    }

    let version = version.strip_prefix("HTTP/").ok_or_else(malformed)?;
    if version != SUPPORTED_VERSION {
        return Err(ParseError::UnsupportedVersion { version: version.to_string() });
    }

    if !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ParseError::InvalidMethod { method: method.to_string() });
    }

    let request_line = RequestLine {
        method: method.to_string(),
        target: target.to_string(),
        http_version: version.to_string(),
    };

    Ok(Some((request_line, line_end + CRLF_LEN)))
}

fn declared_content_length(headers: &Headers) -> Result<Option<usize>, ParseError> {
    let Some(value) = headers.get("content-length") else {
        return Ok(None);
    };

    let invalid = || ParseError::InvalidContentLength { value: value.to_string() };

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    value.parse::<usize>().map(Some).map_err(|_| invalid())
}
