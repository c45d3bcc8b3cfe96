use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use crate::http::parser::{parse_header_line, HeaderLine};

/// Represents a completed HTTP response.
///
/// Contains the final status line, headers and the (possibly truncated)
/// response body.
#[derive(Debug, Clone)]
pub struct Response {
    /// Numeric HTTP status code of the final response
    pub status: u16,
    /// Reason phrase, absent for HTTP/2 and later
    pub reason: Option<String>,
    /// HTTP headers as key-value pairs
    pub headers: HashMap<String, String>,
    /// Response body as bytes, at most the configured body limit
    pub body: Bytes,
    /// Total number of body bytes received, stored or not
    pub downloaded: u64,
}

impl Response {
    /// Returns `true` for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Retrieves a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Content-Length header parsed as a usize, if present and valid.
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length").and_then(|v| v.parse().ok())
    }

    /// Whether part of the body was discarded because of the body limit.
    pub fn truncated(&self) -> bool {
        self.downloaded > self.body.len() as u64
    }
}

/// Accumulates a response while its transfer is running.
///
/// Fed by the transfer engine's header and body callbacks.
#[derive(Debug)]
pub struct ResponseCollector {
    status: u16,
    reason: Option<String>,
    headers: HashMap<String, String>,
    body: BytesMut,
    max_body: usize,
    downloaded: u64,
}

impl ResponseCollector {
    pub fn new(max_body: usize) -> Self {
        Self {
            status: 0,
            reason: None,
            headers: HashMap::new(),
            body: BytesMut::new(),
            max_body,
            downloaded: 0,
        }
    }

    /// Store a body chunk, keeping at most `max_body` bytes overall.
    ///
    /// Returns the number of bytes consumed, which is always the whole chunk.
    pub fn write_body(&mut self, chunk: &[u8]) -> usize {
        self.downloaded += chunk.len() as u64;
        let room = self.max_body.saturating_sub(self.body.len());
        self.body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        chunk.len()
    }

    /// Record one raw header line. Unparseable lines are ignored.
    pub fn header_line(&mut self, line: &[u8]) {
        match parse_header_line(line) {
            Ok(HeaderLine::Status { code, reason, .. }) => {
                // a new head (redirect, 100-continue) replaces the previous one
                self.status = code;
                self.reason = reason;
                self.headers.clear();
            }
            Ok(HeaderLine::Field { name, value }) => {
                self.headers.insert(name, value);
            }
            Ok(HeaderLine::End) => {}
            Err(e) => tracing::trace!(error = ?e, "ignoring malformed header line"),
        }
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Finish the response. `status` overrides the parsed status when the
    /// transfer engine reports one.
    pub fn finish(&mut self, status: Option<u16>) -> Response {
        Response {
            status: status.filter(|s| *s != 0).unwrap_or(self.status),
            reason: self.reason.take(),
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.body).freeze(),
            downloaded: self.downloaded,
        }
    }
}
