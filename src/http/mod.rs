//! HTTP/1.1 request parsing and response framing over a raw byte stream.
//!
//! # Architecture
//!
//! - **`headers`**: Header table and the single-line header sub-parser
//! - **`parser`**: Incremental request parser and the stream-reading driver
//! - **`request`**: Parsed request representation
//! - **`response`**: Status codes and default response headers
//! - **`writer`**: Frames a response (fixed or chunked with trailers) onto a stream
//! - **`connection`**: Reads one request and hands it to the application handler
//!
//! # Parser State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │   Initialized    │ ← Wait for a complete request line
//!        └──────┬───────────┘
//!               │ METHOD TARGET HTTP/1.1\r\n
//!               ▼
//!        ┌──────────────────┐
//!        │  ParsingHeaders  │ ← One header line per step
//!        └──────┬───────────┘
//!               │ \r\n
//!               ▼
//!        ┌──────────────────┐
//!        │   ParsingBody    │ ← Until Content-Length bytes arrive
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │       Done       │
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rawhttp::http::parser::read_request;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let (mut socket, _addr) = listener.accept().await?;
//!     let request = read_request(&mut socket).await?;
//!     println!("{} {}", request.method(), request.target());
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
