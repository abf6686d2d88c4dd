//! One-shot HTTP/1.x parsers.
//!
//! These operate on a single `&[u8]` buffer and return how much of it they
//! consumed. The incremental parser in `super::incremental` is a thin loop
//! around these, so the resync behavior described there (null entries for
//! garbage, continuing from the next version sentinel) is implemented once,
//! here.

use bytes::Bytes;

use super::{header_value, request_sentinel, response_prefix, HeaderParam, HttpRequest, HttpResponse, HTTP_VERSION};

/// Outcome of a single one-shot parse attempt, expressed as how many bytes
/// of the input were consumed rather than a borrowed remainder slice, so
/// callers holding a growable buffer (the incremental parser) can drain in
/// place instead of re-slicing.
pub(crate) enum Outcome<T> {
    /// A full record was parsed; it consumed `consumed` bytes.
    Record(T, usize),
    /// Malformed input was found and bounded; `consumed` bytes (ending at a
    /// line boundary) should be discarded before retrying.
    Garbage(usize),
    /// Not enough data yet to make a decision. Nothing was consumed.
    Incomplete,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits `line` (no trailing CRLF) on single ASCII spaces, rejecting empty
/// tokens, and requires exactly `n` tokens.
fn split_tokens(line: &[u8], n: usize) -> Option<Vec<&[u8]>> {
    let parts: Vec<&[u8]> = line.split(|&b| b == b' ').collect();
    if parts.len() != n || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}

fn to_str(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes).ok()
}

/// How to treat a body when no `Content-Length` header is present.
///
/// The one-shot parser's historical behavior — reading the rest of the
/// buffer as the body — only makes sense when the caller truly has
/// nothing more to append (see `DESIGN.md` Open Question 7). The
/// incremental and streaming parsers instead treat an absent
/// `Content-Length` as a zero-length body, since "the rest of the
/// buffer" has no fixed meaning on a live stream.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyPolicy {
    ConsumeRemainder,
    ZeroLength,
}

/// Parses header lines starting at `pos`, up to and including the blank
/// line that ends the header section. Returns the headers and the offset
/// just past the blank line's CRLF, or `None` if the header section isn't
/// fully buffered yet.
///
/// A single malformed header line (no literal `": "` splitter) is treated
/// as a framing error bounded by that line's own CRLF — this is reported
/// back to the caller as `Err(consumed_through_that_line)` rather than
/// silently dropped, so the caller can resync the same way start-line
/// garbage resyncs.
fn parse_headers(bytes: &[u8], mut pos: usize) -> Result<Option<(Vec<HeaderParam>, usize)>, usize> {
    let mut headers = Vec::new();
    loop {
        let Some(rel_crlf) = find(&bytes[pos..], b"\r\n") else {
            return Ok(None);
        };
        let line_end = pos + rel_crlf;
        let line = &bytes[pos..line_end];
        let next = line_end + 2;
        if line.is_empty() {
            return Ok(Some((headers, next)));
        }
        match find(line, b": ") {
            Some(sep) => {
                let Some(name) = to_str(&line[..sep]) else {
                    return Err(next);
                };
                let Some(value) = to_str(&line[sep + 2..]) else {
                    return Err(next);
                };
                headers.push((name.to_string(), value.to_string()));
                pos = next;
            }
            None => return Err(next),
        }
    }
}

/// Parses one HTTP/1.x request from the front of `bytes`.
///
/// Returns `(record, remaining, success)`:
/// - `record = Some(_)`, `success = true`: a full request was parsed;
///   `remaining` is the unconsumed tail.
/// - `record = None`, `success = false`: malformed input was found and
///   skipped past a line boundary; `remaining` starts after it. Callers
///   driving a stream should treat this as one framing-error event and
///   keep parsing from `remaining`.
/// - `record = None`, `success = true`: not enough data buffered yet;
///   `remaining` is identical to `bytes`.
pub fn parse_one_request(bytes: &[u8]) -> (Option<HttpRequest>, &[u8], bool) {
    match parse_one_request_inner(bytes, BodyPolicy::ConsumeRemainder) {
        Outcome::Record(req, n) => (Some(req), &bytes[n..], true),
        Outcome::Garbage(n) => (None, &bytes[n..], false),
        Outcome::Incomplete => (None, bytes, true),
    }
}

pub(crate) fn parse_one_request_inner(bytes: &[u8], body_policy: BodyPolicy) -> Outcome<HttpRequest> {
    let sentinel = request_sentinel();
    let Some(sent_pos) = find(bytes, &sentinel) else {
        return Outcome::Incomplete;
    };
    let startline_end = sent_pos + sentinel.len();
    let pre = &bytes[..sent_pos];

    if let Some(crlf_pos) = find(pre, b"\r\n") {
        return Outcome::Garbage(crlf_pos + 2);
    }

    // `pre` plus the version token (sentinel minus its trailing CRLF) is
    // the full start-line candidate.
    let full_line_len = sent_pos + HTTP_VERSION.len();
    let full_line = &bytes[..full_line_len];
    let Some(tokens) = split_tokens(full_line, 3) else {
        return Outcome::Garbage(startline_end);
    };
    let (Some(method), Some(target)) = (to_str(tokens[0]), to_str(tokens[1])) else {
        return Outcome::Garbage(startline_end);
    };

    match parse_headers(bytes, startline_end) {
        Err(n) => Outcome::Garbage(n),
        Ok(None) => Outcome::Incomplete,
        Ok(Some((headers, body_start))) => {
            let declared_len = header_value(&headers, "Content-Length")
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = match declared_len {
                Some(len) => {
                    let len = len as usize;
                    if bytes.len() - body_start < len {
                        return Outcome::Incomplete;
                    }
                    Bytes::copy_from_slice(&bytes[body_start..body_start + len])
                }
                None => match body_policy {
                    BodyPolicy::ConsumeRemainder => Bytes::copy_from_slice(&bytes[body_start..]),
                    BodyPolicy::ZeroLength => Bytes::new(),
                },
            };
            let consumed = body_start + body.len();
            Outcome::Record(
                HttpRequest {
                    method: method.to_string(),
                    target: target.to_string(),
                    headers,
                    body,
                },
                consumed,
            )
        }
    }
}

/// A parsed request start-line plus headers, with the body left
/// unconsumed. Used by the streaming parser, which hands body bytes to a
/// pipe instead of buffering them.
pub(crate) struct RequestHead {
    pub method: String,
    pub target: String,
    pub headers: Vec<HeaderParam>,
    pub declared_len: Option<u64>,
}

/// Like [`parse_one_request_inner`] but stops at the end of the header
/// section; `Outcome::Record`'s `usize` is the offset of the first body
/// byte, not the end of a (possibly huge) body.
pub(crate) fn parse_request_head(bytes: &[u8]) -> Outcome<RequestHead> {
    let sentinel = request_sentinel();
    let Some(sent_pos) = find(bytes, &sentinel) else {
        return Outcome::Incomplete;
    };
    let startline_end = sent_pos + sentinel.len();
    let pre = &bytes[..sent_pos];

    if let Some(crlf_pos) = find(pre, b"\r\n") {
        return Outcome::Garbage(crlf_pos + 2);
    }

    let full_line_len = sent_pos + HTTP_VERSION.len();
    let full_line = &bytes[..full_line_len];
    let Some(tokens) = split_tokens(full_line, 3) else {
        return Outcome::Garbage(startline_end);
    };
    let (Some(method), Some(target)) = (to_str(tokens[0]), to_str(tokens[1])) else {
        return Outcome::Garbage(startline_end);
    };

    match parse_headers(bytes, startline_end) {
        Err(n) => Outcome::Garbage(n),
        Ok(None) => Outcome::Incomplete,
        Ok(Some((headers, body_start))) => {
            let declared_len = header_value(&headers, "Content-Length")
                .and_then(|v| v.trim().parse::<u64>().ok());
            Outcome::Record(
                RequestHead {
                    method: method.to_string(),
                    target: target.to_string(),
                    headers,
                    declared_len,
                },
                body_start,
            )
        }
    }
}

/// Parses one HTTP/1.x response from the front of `bytes`. Same
/// `(record, remaining, success)` contract as [`parse_one_request`].
///
/// The response status-line (`HTTP/V SP CODE SP REASON CRLF`) differs from
/// the request line in that the reason phrase may itself contain spaces,
/// so this scans for the version token as a *prefix* rather than a
/// suffix sentinel, then splits only the status code off the remainder.
pub fn parse_one_response(bytes: &[u8]) -> (Option<HttpResponse>, &[u8], bool) {
    match parse_one_response_inner(bytes, BodyPolicy::ConsumeRemainder) {
        Outcome::Record(resp, n) => (Some(resp), &bytes[n..], true),
        Outcome::Garbage(n) => (None, &bytes[n..], false),
        Outcome::Incomplete => (None, bytes, true),
    }
}

pub(crate) fn parse_one_response_inner(bytes: &[u8], body_policy: BodyPolicy) -> Outcome<HttpResponse> {
    let prefix = response_prefix();
    let Some(prefix_pos) = find(bytes, &prefix) else {
        return Outcome::Incomplete;
    };
    let pre = &bytes[..prefix_pos];
    if let Some(crlf_pos) = find(pre, b"\r\n") {
        return Outcome::Garbage(crlf_pos + 2);
    }

    let line_start = prefix_pos + prefix.len();
    let Some(rel_crlf) = find(&bytes[line_start..], b"\r\n") else {
        return Outcome::Incomplete;
    };
    let line_end = line_start + rel_crlf;
    let line = &bytes[line_start..line_end];
    let startline_end = line_end + 2;

    let (code_bytes, reason_bytes) = match find(line, b" ") {
        Some(sep) => (&line[..sep], &line[sep + 1..]),
        None => (line, &line[line.len()..]),
    };
    let (Some(code_str), Some(reason)) = (to_str(code_bytes), to_str(reason_bytes)) else {
        return Outcome::Garbage(startline_end);
    };
    let Ok(code) = code_str.parse::<u16>() else {
        return Outcome::Garbage(startline_end);
    };

    match parse_headers(bytes, startline_end) {
        Err(n) => Outcome::Garbage(n),
        Ok(None) => Outcome::Incomplete,
        Ok(Some((headers, body_start))) => {
            let declared_len = header_value(&headers, "Content-Length")
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = match declared_len {
                Some(len) => {
                    let len = len as usize;
                    if bytes.len() - body_start < len {
                        return Outcome::Incomplete;
                    }
                    Bytes::copy_from_slice(&bytes[body_start..body_start + len])
                }
                None => match body_policy {
                    BodyPolicy::ConsumeRemainder => Bytes::copy_from_slice(&bytes[body_start..]),
                    BodyPolicy::ZeroLength => Bytes::new(),
                },
            };
            let consumed = body_start + body.len();
            Outcome::Record(
                HttpResponse {
                    code,
                    reason: reason.to_string(),
                    headers,
                    body,
                },
                consumed,
            )
        }
    }
}
