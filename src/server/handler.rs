use std::future::Future;

use tokio::net::TcpStream;

use crate::http::request::Request;
use crate::http::writer::ResponseWriter;

/// Application callback invoked once per successfully parsed request.
///
/// The handler owns the writer for the duration of the call and is expected
/// to drive it to completion before returning. The connection closes when
/// the writer is dropped, and a writer dropped mid-message logs a warning.
/// Nothing is returned, so failures inside the handler are the handler's to
/// log.
///
/// Implemented for any `Fn(ResponseWriter<TcpStream>, Request) -> impl Future`.
pub trait Handler: Send + Sync + 'static {
    fn call(
        &self,
        writer: ResponseWriter<TcpStream>,
        request: Request,
    ) -> impl Future<Output = ()> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(ResponseWriter<TcpStream>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    fn call(
        &self,
        writer: ResponseWriter<TcpStream>,
        request: Request,
    ) -> impl Future<Output = ()> + Send {
        self(writer, request)
    }
}
