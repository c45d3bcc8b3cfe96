use asyncurl::http::response::{Response, ResponseCollector};
use bytes::Bytes;
use std::collections::HashMap;

fn response(status: u16, body: &'static [u8]) -> Response {
    Response {
        status,
        reason: None,
        headers: HashMap::new(),
        body: Bytes::from_static(body),
        downloaded: body.len() as u64,
    }
}

#[test]
fn test_response_success_range() {
    assert!(response(200, b"").is_success());
    assert!(response(204, b"").is_success());
    assert!(!response(301, b"").is_success());
    assert!(!response(404, b"").is_success());
    assert!(!response(500, b"").is_success());
}

#[test]
fn test_response_header_lookup_ignores_case() {
    let mut resp = response(200, b"ok");
    resp.headers
        .insert("Content-Length".to_string(), "2".to_string());

    assert_eq!(resp.header("content-length"), Some("2"));
    assert_eq!(resp.content_length(), Some(2));
    assert_eq!(resp.header("X-Missing"), None);
}

#[test]
fn test_response_invalid_content_length() {
    let mut resp = response(200, b"");
    resp.headers
        .insert("Content-Length".to_string(), "lots".to_string());

    assert_eq!(resp.content_length(), None);
}

#[test]
fn test_collector_builds_response() {
    let mut collector = ResponseCollector::new(1024);
    collector.header_line(b"HTTP/1.1 200 OK\r\n");
    collector.header_line(b"X-Custom: value\r\n");
    collector.header_line(b"\r\n");
    collector.write_body(b"Hello, ");
    collector.write_body(b"World!");

    let resp = collector.finish(None);

    assert_eq!(resp.status, 200);
    assert_eq!(resp.reason.as_deref(), Some("OK"));
    assert_eq!(resp.header("X-Custom"), Some("value"));
    assert_eq!(resp.body.as_ref(), b"Hello, World!");
    assert!(!resp.truncated());
}

#[test]
fn test_collector_keeps_only_final_head() {
    let mut collector = ResponseCollector::new(1024);
    collector.header_line(b"HTTP/1.1 301 Moved Permanently\r\n");
    collector.header_line(b"Location: /new\r\n");
    collector.header_line(b"\r\n");
    collector.header_line(b"HTTP/1.1 200 OK\r\n");
    collector.header_line(b"Content-Type: text/plain\r\n");

    let resp = collector.finish(None);

    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Location"), None);
    assert_eq!(resp.header("Content-Type"), Some("text/plain"));
}

#[test]
fn test_collector_truncates_body_at_limit() {
    let mut collector = ResponseCollector::new(4);

    assert_eq!(collector.write_body(b"abc"), 3);
    assert_eq!(collector.write_body(b"defgh"), 5);
    assert_eq!(collector.downloaded(), 8);

    let resp = collector.finish(Some(200));
    assert_eq!(resp.body.as_ref(), b"abcd");
    assert_eq!(resp.downloaded, 8);
    assert!(resp.truncated());
}

#[test]
fn test_collector_reported_status_wins() {
    let mut collector = ResponseCollector::new(16);
    collector.header_line(b"HTTP/1.1 100 Continue\r\n");

    assert_eq!(collector.finish(Some(201)).status, 201);
}

#[test]
fn test_collector_ignores_zero_status() {
    let mut collector = ResponseCollector::new(16);
    collector.header_line(b"HTTP/1.1 204 No Content\r\n");

    assert_eq!(collector.finish(Some(0)).status, 204);
}
