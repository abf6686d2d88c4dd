//! RFC 6455 §5.2 frame decoding: a buffered variant for frames small
//! enough to hold whole, and a streaming variant that hands large
//! payloads to the caller through a pipe as bytes arrive.

use bytes::{Buf, BytesMut};

use crate::pipe::{pipe, PipeWriter};

use super::{BigFrame, Frame, OpCode};

struct Header {
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload_len: u64,
    header_len: usize,
}

/// Decodes just the frame header starting at the front of `bytes`.
/// Returns `None` if fewer than the header's bytes are buffered yet.
fn decode_header(bytes: &[u8]) -> Option<Header> {
    if bytes.len() < 2 {
        return None;
    }
    let fin = bytes[0] & 0x80 != 0;
    let rsv1 = bytes[0] & 0x40 != 0;
    let rsv2 = bytes[0] & 0x20 != 0;
    let rsv3 = bytes[0] & 0x10 != 0;
    let opcode = OpCode::from_nibble(bytes[0] & 0x0F);
    let mask_bit = bytes[1] & 0x80 != 0;
    let len7 = bytes[1] & 0x7F;

    let (payload_len, mut header_len) = match len7 {
        126 => {
            if bytes.len() < 4 {
                return None;
            }
            (u16::from_be_bytes([bytes[2], bytes[3]]) as u64, 4)
        }
        127 => {
            if bytes.len() < 10 {
                return None;
            }
            (u64::from_be_bytes(bytes[2..10].try_into().unwrap()), 10)
        }
        n => (n as u64, 2),
    };

    let mask = if mask_bit {
        if bytes.len() < header_len + 4 {
            return None;
        }
        let key = [
            bytes[header_len],
            bytes[header_len + 1],
            bytes[header_len + 2],
            bytes[header_len + 3],
        ];
        header_len += 4;
        Some(key)
    } else {
        None
    };

    Some(Header {
        fin,
        rsv1,
        rsv2,
        rsv3,
        opcode,
        mask,
        payload_len,
        header_len,
    })
}

fn unmask(payload: &mut [u8], mask: [u8; 4], start_offset: u64) {
    for (i, b) in payload.iter_mut().enumerate() {
        *b ^= mask[(start_offset as usize + i) % 4];
    }
}

/// Decodes one whole frame (header and payload both buffered) from the
/// front of `bytes`. Returns `None` if not enough data is buffered.
fn decode_frame(bytes: &[u8]) -> Option<(Frame, usize)> {
    let h = decode_header(bytes)?;
    let total = h.header_len + h.payload_len as usize;
    if bytes.len() < total {
        return None;
    }
    let mut payload = bytes[h.header_len..total].to_vec();
    if let Some(mask) = h.mask {
        unmask(&mut payload, mask, 0);
    }
    Some((
        Frame {
            fin: h.fin,
            rsv1: h.rsv1,
            rsv2: h.rsv2,
            rsv3: h.rsv3,
            opcode: h.opcode,
            mask: h.mask,
            payload: payload.into(),
        },
        total,
    ))
}

/// Parses a stream of concatenated, fully-buffered frames. Unlike the
/// HTTP parsers, there is no garbage-resync concept here — a malformed
/// header on a real WebSocket connection is a protocol violation the
/// caller should close the connection over, not skip past.
#[derive(Default)]
pub struct FrameParser {
    buf: BytesMut,
}

impl FrameParser {
    pub fn new() -> Self {
        FrameParser { buf: BytesMut::new() }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn parse(&mut self) -> Vec<Frame> {
        let mut out = Vec::new();
        while let Some((frame, n)) = decode_frame(&self.buf) {
            self.buf.advance(n);
            out.push(frame);
        }
        out
    }

    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

/// Parses a stream of frames, handing each one's payload back through a
/// pipe as soon as the header is known, rather than waiting for the
/// whole payload to buffer. Masked payloads are unmasked as each chunk
/// is fed, tracking the mask's cyclic phase across chunk boundaries.
pub struct BigFrameParser {
    buf: BytesMut,
    chunk_max: usize,
    ring_size: usize,
    active: Option<ActiveFrame>,
}

struct ActiveFrame {
    writer: PipeWriter,
    remaining: u64,
    mask: Option<[u8; 4]>,
    mask_offset: u64,
}

impl BigFrameParser {
    pub fn new(chunk_max: usize, ring_size: usize) -> Self {
        BigFrameParser {
            buf: BytesMut::new(),
            chunk_max,
            ring_size,
            active: None,
        }
    }

    pub async fn write(&mut self, bytes: &[u8]) -> Vec<BigFrame> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();

        loop {
            if let Some(active) = self.active.as_mut() {
                if active.remaining == 0 {
                    active.writer.close();
                    self.active = None;
                    continue;
                }
                if self.buf.is_empty() {
                    break;
                }
                let take = (active.remaining as usize).min(self.buf.len());
                let mut chunk = self.buf.split_to(take);
                if let Some(mask) = active.mask {
                    unmask(&mut chunk, mask, active.mask_offset);
                    active.mask_offset += chunk.len() as u64;
                }
                match active.writer.write(&chunk).await {
                    Ok(n) => {
                        active.remaining -= n as u64;
                        if n < chunk.len() || active.remaining == 0 {
                            active.writer.close();
                            self.active = None;
                        }
                    }
                    Err(_) => self.active = None,
                }
                continue;
            }

            let Some(h) = decode_header(&self.buf) else {
                break;
            };
            if self.buf.len() < h.header_len {
                break;
            }
            self.buf.advance(h.header_len);
            let (mut writer, reader) = pipe(self.chunk_max, self.ring_size);
            if h.payload_len == 0 {
                writer.close();
            } else {
                self.active = Some(ActiveFrame {
                    writer,
                    remaining: h.payload_len,
                    mask: h.mask,
                    mask_offset: 0,
                });
            }
            out.push(BigFrame {
                fin: h.fin,
                rsv1: h.rsv1,
                rsv2: h.rsv2,
                rsv3: h.rsv3,
                opcode: h.opcode,
                mask: h.mask,
                payload: reader,
            });
        }

        out
    }
}
