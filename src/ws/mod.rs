//! WebSocket (RFC 6455) framing, the opening handshake, and the worker
//! contract connections are upgraded into.

mod handshake;
mod parser;
mod serialize;
mod worker;

pub use handshake::accept_key;
pub use parser::{BigFrameParser, FrameParser};
pub use serialize::serialize_frame;
pub use worker::{EchoWorker, FrameSender, WsWorker};

use bytes::Bytes;

use crate::pipe::PipeReader;

/// A WebSocket frame opcode. Values above `0xF` cannot occur — frame
/// construction that would produce one is rejected (see
/// [`crate::error::Error::OpcodeOutOfRange`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    /// A reserved opcode this crate doesn't interpret, carried through
    /// verbatim for the worker to decide what to do with.
    Reserved(u8),
}

impl OpCode {
    pub(crate) fn from_nibble(b: u8) -> OpCode {
        match b {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }

    pub(crate) fn to_nibble(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(b) => b,
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// Status codes carried in a Close frame's payload, per RFC 6455 §7.4.1.
pub mod close_code {
    pub const NORMAL_CLOSURE: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const PROTOCOL_ERROR: u16 = 1002;
    pub const UNSUPPORTED_DATA: u16 = 1003;
    pub const NO_STATUS_RECEIVED: u16 = 1005;
    pub const ABNORMAL_CLOSURE: u16 = 1006;
    pub const INVALID_FRAME_PAYLOAD_DATA: u16 = 1007;
    pub const POLICY_VIOLATION: u16 = 1008;
    pub const MESSAGE_TOO_BIG: u16 = 1009;
    pub const MANDATORY_EXTENSION: u16 = 1010;
    pub const INTERNAL_ERROR: u16 = 1011;
}

/// A fully-buffered WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    /// `Some(key)` if the frame carries a mask (always true for
    /// client-to-server frames per RFC 6455 §5.1); payload bytes are
    /// already unmasked regardless.
    pub mask: Option<[u8; 4]>,
    pub payload: Bytes,
}

impl Frame {
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Frame {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: OpCode::Text,
            mask: None,
            payload: payload.into(),
        }
    }

    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Frame {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: OpCode::Binary,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Builds a Close frame carrying `code` as its two-byte payload
    /// prefix, per RFC 6455 §5.5.1.
    pub fn close(code: u16) -> Self {
        Frame {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: OpCode::Close,
            mask: None,
            payload: Bytes::copy_from_slice(&code.to_be_bytes()),
        }
    }
}

/// A frame whose payload streams from a [`PipeReader`], for payloads
/// too large to buffer whole.
#[derive(Debug)]
pub struct BigFrame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    pub payload: PipeReader,
}
