use std::fmt;
use std::io;

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::{is_token_byte, Headers};
use crate::http::response::{default_headers, HandlerError, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

const CHUNKED_TERMINATOR: &[u8] = b"0\r\n";

/// The framing element a write was producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    StatusLine,
    Header,
    Body,
    Chunk,
    Trailer,
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Element::StatusLine => "status line",
            Element::Header => "header",
            Element::Body => "body",
            Element::Chunk => "chunk",
            Element::Trailer => "trailer",
        };
        f.write_str(name)
    }
}

/// What the writer will accept next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    StatusLine,
    Headers,
    /// Either a fixed body or the first chunk.
    Body,
    ChunkedBody,
    /// `0\r\n` is out; the trailer block (possibly empty) must close the message.
    Trailers,
    Done,
    /// A write failed; the connection should be abandoned.
    Failed,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("io error writing {element}: {source}")]
    Io {
        element: Element,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {element} while writer is at {state:?}")]
    OutOfOrder { element: Element, state: WriterState },

    #[error("unsupported status code {code}")]
    UnsupportedStatus { code: u16 },

    #[error("{element} field {name:?} would break message framing")]
    InvalidField { element: Element, name: String },
}

/// Frames one response onto `stream`.
///
/// Calls must follow the message order: status line, headers, then either
/// [`write_body`](Self::write_body) or a run of chunks closed by
/// [`write_chunked_body_done`](Self::write_chunked_body_done) and
/// [`write_trailers`](Self::write_trailers). A call out of order fails with
/// [`WriteError::OutOfOrder`] without touching the stream.
///
/// Dropping a writer part way through a message logs a warning, since the
/// peer is left with a truncated response.
#[derive(Debug)]
pub struct ResponseWriter<W> {
    stream: W,
    phase: Phase,
    body: BytesMut,
    chunked: BytesMut,
}

#[derive(Debug)]
struct Phase {
    state: WriterState,
    armed: bool,
}

impl Drop for Phase {
    fn drop(&mut self) {
        if self.armed && !matches!(self.state, WriterState::Done | WriterState::Failed) {
            tracing::warn!(
                state = ?self.state,
                "Response writer dropped before the message was complete"
            );
        }
    }
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            phase: Phase { state: WriterState::StatusLine, armed: true },
            body: BytesMut::new(),
            chunked: BytesMut::new(),
        }
    }

    pub fn state(&self) -> WriterState {
        self.phase.state
    }

    /// True once the last element of the message has been written.
    pub fn is_complete(&self) -> bool {
        self.phase.state == WriterState::Done
    }

    /// Buffers bytes for [`write_body`](Self::write_body).
    pub fn append_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Every chunk written so far, concatenated.
    pub fn chunked_body(&self) -> &[u8] {
        &self.chunked
    }

    /// Takes the stream back. No warning is logged for an unfinished
    /// message, as the caller has chosen to stop.
    pub fn into_inner(self) -> W {
        let Self { stream, mut phase, .. } = self;
        phase.armed = false;
        stream
    }

    pub async fn write_status_line(&mut self, status: StatusCode) -> Result<(), WriteError> {
        self.expect(Element::StatusLine, &[WriterState::StatusLine])?;

        let line = format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        );

        let result = write_element(&mut self.stream, Element::StatusLine, line.as_bytes()).await;
        self.advance(result, WriterState::Headers)
    }

    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), WriteError> {
        self.expect(Element::Header, &[WriterState::Headers])?;
        check_fields(Element::Header, headers)?;

        let block = encode_fields(headers);
        let result = write_element(&mut self.stream, Element::Header, &block).await;
        self.advance(result, WriterState::Body)
    }

    /// Writes the buffered body verbatim and returns its length.
    pub async fn write_body(&mut self) -> Result<usize, WriteError> {
        self.expect(Element::Body, &[WriterState::Body])?;

        let result = write_element(&mut self.stream, Element::Body, &self.body).await;
        self.advance(result, WriterState::Done)?;

        Ok(self.body.len())
    }

    /// Writes one chunk as `<SIZE hex>\r\n<chunk>\r\n` and returns the bytes
    /// put on the wire. An empty chunk writes nothing, since a zero size
    /// would end the body.
    pub async fn write_chunked_body(&mut self, chunk: &[u8]) -> Result<usize, WriteError> {
        self.expect(Element::Chunk, &[WriterState::Body, WriterState::ChunkedBody])?;

        if chunk.is_empty() {
            return Ok(0);
        }

        let size_line = format!("{:X}\r\n", chunk.len());
        let mut frame = BytesMut::with_capacity(size_line.len() + chunk.len() + 2);
        frame.put_slice(size_line.as_bytes());
        frame.put_slice(chunk);
        frame.put_slice(b"\r\n");

        let result = write_element(&mut self.stream, Element::Chunk, &frame).await;
        self.advance(result, WriterState::ChunkedBody)?;

        self.chunked.extend_from_slice(chunk);
        Ok(frame.len())
    }

    /// Writes the zero-size chunk. The message is not complete until
    /// [`write_trailers`](Self::write_trailers) supplies the closing blank
    /// line, even when there are no trailers to send.
    pub async fn write_chunked_body_done(&mut self) -> Result<usize, WriteError> {
        self.expect(Element::Chunk, &[WriterState::Body, WriterState::ChunkedBody])?;

        let result = write_element(&mut self.stream, Element::Chunk, CHUNKED_TERMINATOR).await;
        self.advance(result, WriterState::Trailers)?;

        Ok(CHUNKED_TERMINATOR.len())
    }

    /// Writes each trailer like a header, then the blank line that ends the
    /// message.
    pub async fn write_trailers(&mut self, trailers: &Headers) -> Result<(), WriteError> {
        self.expect(Element::Trailer, &[WriterState::Trailers])?;
        check_fields(Element::Trailer, trailers)?;

        let block = encode_fields(trailers);
        let result = write_element(&mut self.stream, Element::Trailer, &block).await;
        self.advance(result, WriterState::Done)
    }

    /// Writes a complete plain-text response carrying the error's message.
    pub async fn write_handler_error(&mut self, error: &HandlerError) -> Result<(), WriteError> {
        self.write_status_line(error.status).await?;
        self.write_headers(&default_headers(error.message.len())).await?;

        self.body.clear();
        self.append_body(error.message.as_bytes());
        self.write_body().await?;

        Ok(())
    }

    fn expect(&self, element: Element, allowed: &[WriterState]) -> Result<(), WriteError> {
        if allowed.contains(&self.phase.state) {
            Ok(())
        } else {
            Err(WriteError::OutOfOrder { element, state: self.phase.state })
        }
    }

    fn advance(
        &mut self,
        result: Result<(), WriteError>,
        next: WriterState,
    ) -> Result<(), WriteError> {
        match result {
            Ok(()) => {
                self.phase.state = next;
                Ok(())
            }
            Err(e) => {
                self.phase.state = WriterState::Failed;
                Err(e)
            }
        }
    }
}

async fn write_element<W>(stream: &mut W, element: Element, bytes: &[u8]) -> Result<(), WriteError>
where
    W: AsyncWrite + Unpin,
{
    stream
        .write_all(bytes)
        .await
        .map_err(|source| WriteError::Io { element, source })?;

    stream
        .flush()
        .await
        .map_err(|source| WriteError::Io { element, source })
}

/// Names must be tokens and values must stay on one line, otherwise a single
/// field could inject extra lines or end the block early.
fn check_fields(element: Element, fields: &Headers) -> Result<(), WriteError> {
    for (name, value) in fields.iter() {
        let bad_name = name.is_empty() || !name.bytes().all(is_token_byte);
        if bad_name || value.bytes().any(|b| b == b'\r' || b == b'\n') {
            return Err(WriteError::InvalidField { element, name: name.to_string() });
        }
    }
    Ok(())
}

/// `name: value\r\n` per field, then the blank line closing the block.
fn encode_fields(fields: &Headers) -> BytesMut {
    let mut buf = BytesMut::new();

    for (name, value) in fields.iter() {
        buf.put_slice(name.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }

    buf.put_slice(b"\r\n");
    buf
}
