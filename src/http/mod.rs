//! HTTP/1.x request and response types, and the codecs that parse and
//! serialize them.
//!
//! Headers are kept as an ordered `Vec<(String, String)>` rather than the
//! `http` crate's `HeaderMap`: the wire format this crate implements
//! preserves header order and duplicate names exactly (§3 of the design
//! spec), which `HeaderMap`'s case-normalizing multimap does not
//! guarantee.

mod incremental;
mod parser;
mod serialize;
mod streaming;

pub use incremental::{RequestsParser, ResponsesParser};
pub use parser::{parse_one_request, parse_one_response};
pub use serialize::{serialize_request, serialize_response, BigResponseSerializer};
pub use streaming::{BigRequestsParser, ParsedRequest};

use bytes::Bytes;

use crate::pipe::PipeReader;

/// The HTTP version token this crate speaks on the wire. Two versions
/// exist in the source this spec was distilled from (`HTTP/1.0` and
/// `HTTP/1.1`); `HTTP/1.1` is the one this crate implements (see
/// `DESIGN.md`).
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// The byte sequence that terminates a request start-line:
/// `"HTTP/1.1\r\n"`.
pub(crate) fn request_sentinel() -> Vec<u8> {
    format!("{HTTP_VERSION}\r\n").into_bytes()
}

/// The byte sequence that opens a response status-line: `"HTTP/1.1 "`.
pub(crate) fn response_prefix() -> Vec<u8> {
    format!("{HTTP_VERSION} ").into_bytes()
}

/// An ordered `(name, value)` header pair. Order is preserved end to end.
pub type HeaderParam = (String, String);

/// A fully-buffered HTTP/1.x request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<HeaderParam>,
    pub body: Bytes,
}

/// A fully-buffered HTTP/1.x response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub code: u16,
    pub reason: String,
    pub headers: Vec<HeaderParam>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Builds a response using the standard reason phrase for `code`.
    pub fn new(code: u16, headers: Vec<HeaderParam>, body: Bytes) -> Self {
        HttpResponse {
            code,
            reason: reason_phrase(code).to_string(),
            headers,
            body,
        }
    }
}

/// A request whose body is a lazy reader, for bodies still arriving on
/// the wire while headers are already available.
#[derive(Debug)]
pub struct HttpBigRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<HeaderParam>,
    pub body: PipeReader,
}

/// A response whose body is a lazy reader.
#[derive(Debug)]
pub struct HttpBigResponse {
    pub code: u16,
    pub reason: String,
    pub headers: Vec<HeaderParam>,
    pub body: PipeReader,
}

/// Looks up a header by name, case-insensitively, returning the first
/// match in declaration order.
pub fn header_value<'a>(headers: &'a [HeaderParam], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Parses the `Content-Length` header, if present, per this crate's
/// case-insensitive policy (a deliberate correction of the source's
/// case-sensitive compare — see `DESIGN.md` Open Question 2).
pub fn content_length(headers: &[HeaderParam]) -> Option<u64> {
    header_value(headers, "Content-Length").and_then(|v| v.trim().parse::<u64>().ok())
}

/// Maps a status code to its standard reason phrase, per RFC 7231 §6 and
/// RFC 7232/7233/7235 for the codes outside RFC 7231's own table. Falls
/// back to `"Unknown"` for codes outside that table.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        426 => "Upgrade Required",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let headers = vec![("Content-Length".to_string(), "5".to_string())];
        assert_eq!(header_value(&headers, "content-length"), Some("5"));
        assert_eq!(content_length(&headers), Some(5));
    }

    #[test]
    fn unknown_code_falls_back() {
        assert_eq!(reason_phrase(799), "Unknown");
        assert_eq!(reason_phrase(200), "OK");
    }
}
