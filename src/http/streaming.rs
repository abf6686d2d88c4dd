//! Streaming request parsing: headers are handed to the caller as soon as
//! they're buffered, while the body streams through a [`crate::pipe`] as
//! more bytes arrive. Used for request bodies too large, or arriving too
//! slowly, to buffer whole before dispatching to a handler.

use bytes::{Buf, BytesMut};

use crate::pipe::{pipe, PipeWriter};

use super::parser::{parse_request_head, Outcome};
use super::HttpBigRequest;

/// A streaming request record handed back by [`BigRequestsParser::write`].
/// An alias rather than a new type: it's exactly an [`HttpBigRequest`].
pub type ParsedRequest = HttpBigRequest;

/// Parses a stream of concatenated requests, producing each record as
/// soon as its headers are available and feeding its body to a
/// [`crate::pipe::PipeReader`] as bytes keep arriving.
///
/// Only one body pipe is ever open at a time: `write` will not begin
/// parsing the next request's headers until the current one's body has
/// been fully fed (or its reader has been dropped).
pub struct BigRequestsParser {
    buf: BytesMut,
    chunk_max: usize,
    ring_size: usize,
    active: Option<(PipeWriter, u64)>,
}

impl BigRequestsParser {
    pub fn new(chunk_max: usize, ring_size: usize) -> Self {
        BigRequestsParser {
            buf: BytesMut::new(),
            chunk_max,
            ring_size,
            active: None,
        }
    }

    /// Appends `bytes`, then feeds as much of an open body pipe and
    /// parses as many new headers as the buffer now allows. May suspend
    /// while a slow consumer leaves the active body's pipe ring full —
    /// this is the backpressure path from the application back to the
    /// socket reader.
    pub async fn write(&mut self, bytes: &[u8]) -> Vec<Option<HttpBigRequest>> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();

        loop {
            if let Some((writer, remaining)) = self.active.as_mut() {
                if *remaining == 0 {
                    writer.close();
                    self.active = None;
                    continue;
                }
                if self.buf.is_empty() {
                    break;
                }
                let take = (*remaining as usize).min(self.buf.len());
                let chunk = self.buf.split_to(take);
                match writer.write(&chunk).await {
                    Ok(n) => {
                        *remaining -= n as u64;
                        if n < chunk.len() {
                            // Reader dropped mid-body; stop feeding it.
                            self.active = None;
                        } else if *remaining == 0 {
                            writer.close();
                            self.active = None;
                        }
                    }
                    Err(_) => self.active = None,
                }
                continue;
            }

            match parse_request_head(&self.buf) {
                Outcome::Garbage(n) => {
                    self.buf.advance(n);
                    out.push(None);
                }
                Outcome::Incomplete => break,
                Outcome::Record(head, body_start) => {
                    self.buf.advance(body_start);
                    let len = head.declared_len.unwrap_or(0);
                    let (mut writer, reader) = pipe(self.chunk_max, self.ring_size);
                    if len == 0 {
                        writer.close();
                    } else {
                        self.active = Some((writer, len));
                    }
                    out.push(Some(HttpBigRequest {
                        method: head.method,
                        target: head.target,
                        headers: head.headers,
                        body: reader,
                    }));
                }
            }
        }

        out
    }
}
