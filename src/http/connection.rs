use std::net::SocketAddr;

use tokio::net::TcpStream;
use tracing::Instrument;

use crate::http::parser::{read_request, ParseError};
use crate::http::writer::ResponseWriter;
use crate::server::handler::Handler;

/// One accepted client connection, serving exactly one request.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Reads the request and hands it, with a writer over this connection,
    /// to `handler`.
    ///
    /// A request that fails to parse is returned as an error and the handler
    /// is never invoked. The stream is closed when this returns either way.
    /// The handler runs inside a span naming the peer, so a response it
    /// abandons half written is logged against this connection.
    pub async fn run<H: Handler>(mut self, handler: &H) -> Result<(), ParseError> {
        let request = read_request(&mut self.stream).await?;

        tracing::debug!(
            peer = %self.peer,
            method = %request.method(),
            target = %request.target(),
            body_len = request.body.len(),
            "Request parsed"
        );

        let writer = ResponseWriter::new(self.stream);
        handler
            .call(writer, request)
            .instrument(tracing::warn_span!("connection", peer = %self.peer))
            .await;

        tracing::debug!(peer = %self.peer, "Handler finished, closing connection");
        Ok(())
    }
}
