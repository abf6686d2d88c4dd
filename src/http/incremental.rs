//! Incremental, restartable HTTP/1.x parsing over a continuous byte
//! stream. Feed bytes in with `write`, drain parsed records with `parse`.

use bytes::{Buf, Bytes, BytesMut};

use super::parser::{parse_one_request_inner, parse_one_response_inner, BodyPolicy, Outcome};
use super::{HttpRequest, HttpResponse};

/// Parses a stream of concatenated HTTP requests.
///
/// `parse()` drains as many records as the buffered bytes allow. A `None`
/// entry in the returned list denotes a framing-error event: garbage was
/// found and skipped up to the next line boundary, and parsing resumed
/// from there looking for the next version sentinel. This can repeat
/// several times per call if multiple garbage lines precede the next
/// valid request.
#[derive(Default)]
pub struct RequestsParser {
    buf: BytesMut,
}

impl RequestsParser {
    pub fn new() -> Self {
        RequestsParser { buf: BytesMut::new() }
    }

    /// Appends newly-read bytes to the internal buffer.
    pub fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Drains every record the currently-buffered bytes allow.
    pub fn parse(&mut self) -> Vec<Option<HttpRequest>> {
        let mut out = Vec::new();
        while let Some(record) = self.parse_one() {
            out.push(record);
        }
        out
    }

    /// Parses at most one record (or one garbage-resync event) from the
    /// front of the buffer. Returns `None` if nothing more is buffered
    /// yet, distinct from `Some(None)` which denotes a garbage event.
    ///
    /// Used by [`crate::consumer::HttpWsConsumer`], which needs to stop
    /// draining mid-buffer the moment a request upgrades the connection
    /// to WebSocket, handing whatever bytes are left unparsed to the
    /// frame parser via [`Self::take_pending`] instead of letting this
    /// parser keep trying to interpret them as more HTTP requests.
    pub fn parse_one(&mut self) -> Option<Option<HttpRequest>> {
        match parse_one_request_inner(&self.buf, BodyPolicy::ZeroLength) {
            Outcome::Record(req, n) => {
                self.buf.advance(n);
                Some(Some(req))
            }
            Outcome::Garbage(n) => {
                self.buf.advance(n);
                Some(None)
            }
            Outcome::Incomplete => None,
        }
    }

    /// Removes and returns whatever bytes are currently buffered but
    /// unparsed, leaving this parser empty.
    pub fn take_pending(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

/// Parses a stream of concatenated HTTP responses. Same resync contract
/// as [`RequestsParser`].
#[derive(Default)]
pub struct ResponsesParser {
    buf: BytesMut,
}

impl ResponsesParser {
    pub fn new() -> Self {
        ResponsesParser { buf: BytesMut::new() }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn parse(&mut self) -> Vec<Option<HttpResponse>> {
        let mut out = Vec::new();
        loop {
            match parse_one_response_inner(&self.buf, BodyPolicy::ZeroLength) {
                Outcome::Record(resp, n) => {
                    self.buf.advance(n);
                    out.push(Some(resp));
                }
                Outcome::Garbage(n) => {
                    self.buf.advance(n);
                    out.push(None);
                }
                Outcome::Incomplete => break,
            }
        }
        out
    }

    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_multiple_requests_in_one_call() {
        let mut p = RequestsParser::new();
        p.write(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");
        let out = p.parse();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().target, "/a");
        assert_eq!(out[1].as_ref().unwrap().target, "/b");
        assert_eq!(p.pending_bytes(), 0);
    }

    #[test]
    fn splits_a_request_across_two_writes() {
        let mut p = RequestsParser::new();
        p.write(b"GET /a HTTP/1.1\r\nHost: x\r\n\r");
        assert!(p.parse().is_empty());
        p.write(b"\n");
        let out = p.parse();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().target, "/a");
    }

    #[test]
    fn garbage_interleaved_between_valid_requests_yields_null_entries() {
        let mut p = RequestsParser::new();
        p.write(b"junk1\r\nGET /a HTTP/1.1\r\n\r\njunk2\r\nGET /b HTTP/1.1\r\n\r\n");
        let out = p.parse();
        assert_eq!(out.len(), 4);
        assert!(out[0].is_none());
        assert_eq!(out[1].as_ref().unwrap().target, "/a");
        assert!(out[2].is_none());
        assert_eq!(out[3].as_ref().unwrap().target, "/b");
    }

    #[test]
    fn absent_content_length_is_zero_length_body_in_incremental_parser() {
        let mut p = RequestsParser::new();
        p.write(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");
        let out = p.parse();
        assert_eq!(out.len(), 2);
        assert!(out[0].as_ref().unwrap().body.is_empty());
    }
}
