//! Routes served by the `rawhttp` binary.
//!
//! Generic over the stream so they can be driven against an in-memory
//! buffer as well as a socket.

use sha2::{Digest, Sha256};
use tokio::io::AsyncWrite;

use crate::http::headers::Headers;
use crate::http::request::Request;
use crate::http::response::{HandlerError, StatusCode};
use crate::http::writer::{ResponseWriter, WriteError};

/// Upper bound on `/stream/<n>` so a single request can't stream forever.
pub const MAX_STREAM_LINES: usize = 10_000;

pub const OK_HTML: &str = r#"<html>
  <head>
    <title>200 OK</title>
  </head>
  <body>
    <h1>Success!</h1>
    <p>Your request was an absolute banger.</p>
  </body>
</html>
"#;

pub const BAD_REQUEST_HTML: &str = r#"<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>
"#;

pub const INTERNAL_ERROR_HTML: &str = r#"<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>
"#;

/// Dispatches on the request target:
///
/// - `/yourproblem`: 400 page
/// - `/myproblem`: 500 page
/// - `/stream/<n>`: `n` lines as a chunked body, see [`stream_lines`]
/// - anything else: 200 page
pub async fn route<W>(mut writer: ResponseWriter<W>, request: Request)
where
    W: AsyncWrite + Unpin,
{
    let target = request.target().to_string();

    let result = match target.as_str() {
        "/yourproblem" => write_html(&mut writer, StatusCode::BadRequest, BAD_REQUEST_HTML).await,
        "/myproblem" => {
            write_html(&mut writer, StatusCode::InternalServerError, INTERNAL_ERROR_HTML).await
        }
        other => match other.strip_prefix("/stream/") {
            Some(count) => stream_lines(&mut writer, count).await,
            None => write_html(&mut writer, StatusCode::Ok, OK_HTML).await,
        },
    };

    if let Err(e) = result {
        tracing::error!(path = %target, error = %e, "Failed to write response");
    }
}

async fn write_html<W>(
    writer: &mut ResponseWriter<W>,
    status: StatusCode,
    html: &str,
) -> Result<(), WriteError>
where
    W: AsyncWrite + Unpin,
{
    writer.append_body(html.as_bytes());

    writer.write_status_line(status).await?;
    writer
        .write_headers(&Headers::from_iter([
            ("Content-Length", html.len().to_string()),
            ("Connection", "close".to_string()),
            ("Content-Type", "text/html".to_string()),
        ]))
        .await?;
    writer.write_body().await?;

    Ok(())
}

/// Streams `count` generated lines as a chunked body, followed by trailers
/// carrying the body's SHA-256 and length.
///
/// A count that is not a number or exceeds [`MAX_STREAM_LINES`] gets a plain
/// 400 response instead.
pub async fn stream_lines<W>(
    writer: &mut ResponseWriter<W>,
    count: &str,
) -> Result<(), WriteError>
where
    W: AsyncWrite + Unpin,
{
    let count = match count.parse::<usize>() {
        Ok(n) if n <= MAX_STREAM_LINES => n,
        _ => {
            let error = HandlerError::bad_request(format!(
                "stream length must be a number no greater than {MAX_STREAM_LINES}"
            ));
            return writer.write_handler_error(&error).await;
        }
    };

    writer.write_status_line(StatusCode::Ok).await?;
    writer
        .write_headers(&Headers::from_iter([
            ("Content-Type", "text/plain"),
            ("Transfer-Encoding", "chunked"),
            ("Trailer", "X-Content-Sha256, X-Content-Length"),
        ]))
        .await?;

    let mut written = 0;
    for i in 0..count {
        let line = format!("{{\"line\": {i}}}\n");
        written += writer.write_chunked_body(line.as_bytes()).await?;
    }
    written += writer.write_chunked_body_done().await?;

    let body = writer.chunked_body();
    let trailers = Headers::from_iter([
        ("X-Content-Sha256", format!("{:x}", Sha256::digest(body))),
        ("X-Content-Length", body.len().to_string()),
    ]);
    writer.write_trailers(&trailers).await?;

    tracing::debug!(lines = count, bytes_on_wire = written, "Streamed chunked body");
    Ok(())
}
