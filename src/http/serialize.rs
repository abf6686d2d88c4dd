//! HTTP/1.x serialization: one-shot (`Vec<u8>`) and streaming variants.

use crate::error::Error;
use crate::pipe::PipeReader;
use crate::producer::Producer;

use super::{HeaderParam, HttpBigResponse, HttpRequest, HttpResponse, HTTP_VERSION};

fn push_headers(out: &mut Vec<u8>, headers: &[HeaderParam]) {
    for (name, value) in headers {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}

/// Serializes a request exactly: method, target, and headers appear in
/// the order given, with no reordering, deduplication, or normalization.
pub fn serialize_request(req: &HttpRequest) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + req.body.len());
    out.extend_from_slice(req.method.as_bytes());
    out.push(b' ');
    out.extend_from_slice(req.target.as_bytes());
    out.push(b' ');
    out.extend_from_slice(HTTP_VERSION.as_bytes());
    out.extend_from_slice(b"\r\n");
    push_headers(&mut out, &req.headers);
    out.extend_from_slice(&req.body);
    out
}

/// Serializes a response exactly, same ordering guarantee as
/// [`serialize_request`].
pub fn serialize_response(resp: &HttpResponse) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + resp.body.len());
    out.extend_from_slice(HTTP_VERSION.as_bytes());
    out.push(b' ');
    out.extend_from_slice(resp.code.to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(resp.reason.as_bytes());
    out.extend_from_slice(b"\r\n");
    push_headers(&mut out, &resp.headers);
    out.extend_from_slice(&resp.body);
    out
}

/// Writes a response whose body streams from a [`PipeReader`] instead of
/// sitting fully buffered, chaining header bytes, body bytes, and an
/// optional trailer onto a [`Producer`] in order. The caller is
/// responsible for a `Content-Length` header matching the body's actual
/// length — this crate has no chunked-transfer-encoding writer, since
/// nothing in its wire format calls for one.
pub struct BigResponseSerializer;

impl BigResponseSerializer {
    pub async fn write(
        producer: &Producer,
        code: u16,
        reason: &str,
        headers: &[HeaderParam],
        mut body: PipeReader,
        trailer: Option<&[u8]>,
    ) -> Result<(), Error> {
        let mut head = Vec::with_capacity(64);
        head.extend_from_slice(HTTP_VERSION.as_bytes());
        head.push(b' ');
        head.extend_from_slice(code.to_string().as_bytes());
        head.push(b' ');
        head.extend_from_slice(reason.as_bytes());
        head.extend_from_slice(b"\r\n");
        push_headers(&mut head, headers);
        producer.write(&head).await?;

        let mut buf = [0u8; 8192];
        loop {
            let n = body
                .read(&mut buf)
                .await
                .map_err(|_| Error::EndOfStream)?;
            if n == 0 {
                break;
            }
            producer.write(&buf[..n]).await?;
        }

        if let Some(trailer) = trailer {
            producer.write(trailer).await?;
        }
        Ok(())
    }

    /// Convenience entry point taking an already-assembled
    /// [`HttpBigResponse`] instead of its fields split apart.
    pub async fn write_response(
        producer: &Producer,
        resp: HttpBigResponse,
        trailer: Option<&[u8]>,
    ) -> Result<(), Error> {
        Self::write(producer, resp.code, &resp.reason, &resp.headers, resp.body, trailer).await
    }
}
