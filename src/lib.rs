//! `pipeworks` is a small async networking stack: a connection server
//! core (accept loop, per-connection tasks, graceful shutdown) wired to
//! two pluggable wire-format consumers — an HTTP/1.x parser/serializer
//! and an RFC 6455 WebSocket frame codec — plus the non-blocking byte
//! pipe that lets either codec expose a streaming body while more bytes
//! are still arriving on the wire.
//!
//! Start with [`Server::bind`] to accept connections, and
//! [`consumer::HttpWsConsumer`] for the HTTP⇄WebSocket consumer this
//! crate ships out of the box. Bring your own [`consumer::Consumer`] to
//! speak a different wire format over the same server core.

pub mod consumer;
pub mod error;
pub mod http;
pub mod pipe;
pub mod producer;
pub mod server;
pub mod ws;

pub use consumer::{Consumer, HandlerOutcome, HttpHandler, HttpWsConsumer};
pub use error::{EndOfBudget, EndOfStream, Error, Result};
pub use producer::Producer;
pub use server::Server;
