use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::http::connection::Connection;
use crate::http::parser::ParseError;
use crate::server::handler::Handler;

/// Handle to a running accept loop.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    accept_task: JoinHandle<()>,
}

/// Binds `port` on all interfaces and starts accepting in the background.
///
/// Every accepted connection gets its own task which parses one request and
/// passes it to `handler`. Port `0` picks an ephemeral port; see
/// [`Server::local_addr`].
pub async fn serve<H: Handler>(port: u16, handler: H) -> anyhow::Result<Server> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind tcp listener on port {port}"))?;

    let local_addr = listener.local_addr()?;
    info!("Listening on {}", local_addr);

    let closed = Arc::new(AtomicBool::new(false));
    let shutdown = Arc::new(Notify::new());

    let accept_task = tokio::spawn(accept_loop(
        listener,
        Arc::new(handler),
        Arc::clone(&closed),
        Arc::clone(&shutdown),
    ));

    Ok(Server {
        local_addr,
        closed,
        shutdown,
        accept_task,
    })
}

impl Server {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections and waits for the accept loop to
    /// release the listener. Connections already accepted run to completion.
    pub async fn close(self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::Release);
        self.shutdown.notify_one();

        self.accept_task
            .await
            .context("accept loop terminated abnormally")?;

        info!("Server on {} closed", self.local_addr);
        Ok(())
    }
}

async fn accept_loop<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    while !closed.load(Ordering::Acquire) {
        let accepted = tokio::select! {
            res = listener.accept() => res,
            _ = shutdown.notified() => break,
        };

        let (socket, peer) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                if closed.load(Ordering::Acquire) {
                    break;
                }
                debug!(error = %e, "Transient accept error");
                continue;
            }
        };

        debug!("Accepted connection from {}", peer);

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let conn = Connection::new(socket, peer);
            match conn.run(handler.as_ref()).await {
                Ok(()) => {}
                Err(e @ ParseError::Io { .. }) => {
                    debug!(peer = %peer, error = %e, "Connection dropped while reading request");
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Malformed request, closing connection");
                }
            }
        });
    }
}
