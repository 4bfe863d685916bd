use std::io;

use rawhttp::http::headers::Headers;
use rawhttp::http::response::{HandlerError, StatusCode};
use rawhttp::http::writer::{Element, ResponseWriter, WriteError, WriterState};
use tracing_test::traced_test;

fn as_text(writer: ResponseWriter<Vec<u8>>) -> String {
    String::from_utf8(writer.into_inner()).unwrap()
}

#[tokio::test]
async fn test_write_status_lines() {
    let cases = [
        (StatusCode::Ok, "HTTP/1.1 200 OK\r\n"),
        (StatusCode::BadRequest, "HTTP/1.1 400 Bad Request\r\n"),
        (StatusCode::InternalServerError, "HTTP/1.1 500 Internal Server Error\r\n"),
    ];

    for (status, expected) in cases {
        let mut writer = ResponseWriter::new(Vec::new());
        writer.write_status_line(status).await.unwrap();

        assert_eq!(writer.state(), WriterState::Headers);
        assert_eq!(as_text(writer), expected);
    }
}

#[tokio::test]
async fn test_write_fixed_length_response() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.append_body(b"hello");

    writer.write_status_line(StatusCode::Ok).await.unwrap();
    writer
        .write_headers(&Headers::from_iter([("Content-Length", "5")]))
        .await
        .unwrap();
    let n = writer.write_body().await.unwrap();

    assert_eq!(n, 5);
    assert!(writer.is_complete());
    assert_eq!(
        as_text(writer),
        "HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nhello"
    );
}

#[tokio::test]
async fn test_write_headers_block() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.write_status_line(StatusCode::Ok).await.unwrap();
    writer
        .write_headers(&Headers::from_iter([
            ("Content-Type", "text/html"),
            ("Connection", "close"),
        ]))
        .await
        .unwrap();

    let text = as_text(writer);
    let head = text.strip_prefix("HTTP/1.1 200 OK\r\n").unwrap();

    // header order is unspecified
    assert!(head.ends_with("\r\n\r\n"));
    assert!(head.contains("content-type: text/html\r\n"));
    assert!(head.contains("connection: close\r\n"));
    assert_eq!(head.len(), "content-type: text/html\r\nconnection: close\r\n\r\n".len());
}

#[tokio::test]
async fn test_write_chunked_body() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.write_status_line(StatusCode::Ok).await.unwrap();
    writer.write_headers(&Headers::new()).await.unwrap();

    assert_eq!(writer.write_chunked_body(b"abc").await.unwrap(), 8);
    assert_eq!(writer.write_chunked_body(b"de").await.unwrap(), 7);
    assert_eq!(writer.write_chunked_body_done().await.unwrap(), 3);

    assert_eq!(writer.chunked_body(), b"abcde");
    assert_eq!(writer.state(), WriterState::Trailers);
    assert!(!writer.is_complete());

    let text = as_text(writer);
    assert_eq!(
        text.strip_prefix("HTTP/1.1 200 OK\r\n\r\n").unwrap(),
        "3\r\nabc\r\n2\r\nde\r\n0\r\n"
    );
}

#[tokio::test]
async fn test_chunk_size_is_uppercase_hex() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.write_status_line(StatusCode::Ok).await.unwrap();
    writer.write_headers(&Headers::new()).await.unwrap();

    let chunk = vec![b'x'; 255];
    writer.write_chunked_body(&chunk).await.unwrap();

    let text = as_text(writer);
    let body = text.strip_prefix("HTTP/1.1 200 OK\r\n\r\n").unwrap();
    assert!(body.starts_with("FF\r\nxxx"));
    assert!(body.ends_with("x\r\n"));
}

#[tokio::test]
async fn test_empty_chunk_writes_nothing() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.write_status_line(StatusCode::Ok).await.unwrap();
    writer.write_headers(&Headers::new()).await.unwrap();

    assert_eq!(writer.write_chunked_body(b"").await.unwrap(), 0);
    assert!(writer.chunked_body().is_empty());
    assert_eq!(as_text(writer), "HTTP/1.1 200 OK\r\n\r\n");
}

#[tokio::test]
async fn test_write_trailers_closes_message() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.write_status_line(StatusCode::Ok).await.unwrap();
    writer
        .write_headers(&Headers::from_iter([("Trailer", "X-Content-Length")]))
        .await
        .unwrap();
    writer.write_chunked_body(b"hello").await.unwrap();
    writer.write_chunked_body_done().await.unwrap();

    let length = writer.chunked_body().len().to_string();
    writer
        .write_trailers(&Headers::from_iter([("X-Content-Length", length)]))
        .await
        .unwrap();

    assert!(writer.is_complete());
    assert_eq!(
        as_text(writer),
        "HTTP/1.1 200 OK\r\ntrailer: X-Content-Length\r\n\r\n\
         5\r\nhello\r\n0\r\nx-content-length: 5\r\n\r\n"
    );
}

#[tokio::test]
async fn test_empty_trailers_still_close_message() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.write_status_line(StatusCode::Ok).await.unwrap();
    writer.write_headers(&Headers::new()).await.unwrap();
    writer.write_chunked_body_done().await.unwrap();
    writer.write_trailers(&Headers::new()).await.unwrap();

    assert!(writer.is_complete());
    assert_eq!(as_text(writer), "HTTP/1.1 200 OK\r\n\r\n0\r\n\r\n");
}

#[tokio::test]
async fn test_out_of_order_calls_are_rejected() {
    let mut writer = ResponseWriter::new(Vec::new());

    let result = writer.write_headers(&Headers::new()).await;
    assert!(matches!(
        result,
        Err(WriteError::OutOfOrder { element: Element::Header, state: WriterState::StatusLine })
    ));

    writer.write_status_line(StatusCode::Ok).await.unwrap();
    let result = writer.write_status_line(StatusCode::Ok).await;
    assert!(matches!(result, Err(WriteError::OutOfOrder { element: Element::StatusLine, .. })));

    let result = writer.write_body().await;
    assert!(matches!(result, Err(WriteError::OutOfOrder { element: Element::Body, .. })));

    writer.write_headers(&Headers::new()).await.unwrap();
    writer.write_chunked_body(b"abc").await.unwrap();

    let result = writer.write_body().await;
    assert!(matches!(result, Err(WriteError::OutOfOrder { element: Element::Body, .. })));

    let result = writer.write_trailers(&Headers::new()).await;
    assert!(matches!(result, Err(WriteError::OutOfOrder { element: Element::Trailer, .. })));

    // rejected calls leave nothing on the wire
    assert_eq!(as_text(writer), "HTTP/1.1 200 OK\r\n\r\n3\r\nabc\r\n");
}

#[tokio::test]
async fn test_nothing_follows_fixed_body() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.write_status_line(StatusCode::Ok).await.unwrap();
    writer.write_headers(&Headers::new()).await.unwrap();
    writer.write_body().await.unwrap();

    let result = writer.write_chunked_body(b"late").await;
    assert!(matches!(
        result,
        Err(WriteError::OutOfOrder { element: Element::Chunk, state: WriterState::Done })
    ));
}

#[tokio::test]
async fn test_io_error_is_tagged_and_poisons_writer() {
    let stream = tokio_test::io::Builder::new()
        .write(b"HTTP/1.1 200 OK\r\n")
        .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
        .build();
    let mut writer = ResponseWriter::new(stream);

    writer.write_status_line(StatusCode::Ok).await.unwrap();
    let result = writer.write_headers(&Headers::new()).await;

    assert!(matches!(
        result,
        Err(WriteError::Io { element: Element::Header, ref source })
            if source.kind() == io::ErrorKind::BrokenPipe
    ));
    assert_eq!(writer.state(), WriterState::Failed);

    let result = writer.write_body().await;
    assert!(matches!(result, Err(WriteError::OutOfOrder { state: WriterState::Failed, .. })));
}

#[tokio::test]
async fn test_write_handler_error() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer
        .write_handler_error(&HandlerError::bad_request("bad input"))
        .await
        .unwrap();

    assert!(writer.is_complete());

    let text = as_text(writer);
    assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(text.contains("content-length: 9\r\n"));
    assert!(text.contains("connection: close\r\n"));
    assert!(text.contains("content-type: text/plain\r\n"));
    assert!(text.ends_with("\r\n\r\nbad input"));
}

#[tokio::test]
async fn test_header_value_with_line_break_is_rejected() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.write_status_line(StatusCode::Ok).await.unwrap();

    let result = writer
        .write_headers(&Headers::from_iter([("X-A", "v\r\nInjected: yes")]))
        .await;

    assert!(matches!(
        result,
        Err(WriteError::InvalidField { element: Element::Header, ref name }) if name == "x-a"
    ));
    assert_eq!(writer.state(), WriterState::Headers);

    // still usable, and the bad block never reached the stream
    writer.write_headers(&Headers::new()).await.unwrap();
    assert_eq!(as_text(writer), "HTTP/1.1 200 OK\r\n\r\n");
}

#[tokio::test]
async fn test_non_token_header_name_is_rejected() {
    for name in ["X A", "X:A", "", "X\nA"] {
        let mut writer = ResponseWriter::new(Vec::new());
        writer.write_status_line(StatusCode::Ok).await.unwrap();

        let result = writer.write_headers(&Headers::from_iter([(name, "v")])).await;

        assert!(
            matches!(result, Err(WriteError::InvalidField { element: Element::Header, .. })),
            "name {name:?}"
        );
        assert_eq!(as_text(writer), "HTTP/1.1 200 OK\r\n");
    }
}

#[tokio::test]
async fn test_trailer_with_line_break_is_rejected() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.write_status_line(StatusCode::Ok).await.unwrap();
    writer.write_headers(&Headers::new()).await.unwrap();
    writer.write_chunked_body_done().await.unwrap();

    let result = writer
        .write_trailers(&Headers::from_iter([("X-Sum", "abc\n")]))
        .await;

    assert!(matches!(
        result,
        Err(WriteError::InvalidField { element: Element::Trailer, .. })
    ));
    assert_eq!(writer.state(), WriterState::Trailers);
    assert_eq!(as_text(writer), "HTTP/1.1 200 OK\r\n\r\n0\r\n");
}

#[tokio::test]
#[traced_test]
async fn test_dropping_unfinished_writer_warns() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer.write_status_line(StatusCode::Ok).await.unwrap();
    writer.write_headers(&Headers::new()).await.unwrap();
    writer.write_chunked_body(b"abc").await.unwrap();
    writer.write_chunked_body_done().await.unwrap();

    drop(writer);

    assert!(logs_contain("Response writer dropped before the message was complete"));
    assert!(logs_contain("Trailers"));
}

#[tokio::test]
#[traced_test]
async fn test_dropping_finished_writer_is_quiet() {
    let mut writer = ResponseWriter::new(Vec::new());
    writer
        .write_handler_error(&HandlerError::internal("boom"))
        .await
        .unwrap();

    drop(writer);

    assert!(!logs_contain("dropped before the message was complete"));
}
