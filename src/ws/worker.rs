//! The WebSocket dispatcher contract a connection is upgraded into, and
//! the built-in echo implementation.

use async_trait::async_trait;

use crate::error::Error;
use crate::producer::Producer;

use super::{close_code, serialize_frame, Frame, OpCode};

/// A handle a [`WsWorker`] uses to emit frames back to its peer. Wraps
/// the connection's [`Producer`] with frame serialization so workers
/// never build wire bytes by hand.
#[derive(Clone)]
pub struct FrameSender {
    producer: Producer,
}

impl FrameSender {
    pub(crate) fn new(producer: Producer) -> Self {
        FrameSender { producer }
    }

    /// Serializes and writes `frame`.
    pub async fn send(&self, frame: Frame) -> Result<(), Error> {
        let bytes = serialize_frame(&frame);
        self.producer.write(&bytes).await?;
        Ok(())
    }
}

/// Per-connection WebSocket dispatcher: receives [`WsWorker::initialize`]
/// once before the first frame, then one [`WsWorker::work`] call per
/// received frame, then exactly one [`WsWorker::close`].
///
/// A worker decides for itself what to do with control opcodes
/// (Close/Ping/Pong) — this crate only guarantees delivery, not a default
/// control-frame policy, except in [`EchoWorker`].
#[async_trait]
pub trait WsWorker: Send {
    async fn initialize(&mut self, sender: FrameSender, closer: Producer);
    async fn work(&mut self, frame: Frame);
    async fn close(&mut self) -> Result<(), Error>;
}

/// Mirrors every data frame back to the sender. Replies to Ping with
/// Pong; on Close, sends a Close frame back and closes the connection.
#[derive(Default)]
pub struct EchoWorker {
    sender: Option<FrameSender>,
    closer: Option<Producer>,
}

#[async_trait]
impl WsWorker for EchoWorker {
    async fn initialize(&mut self, sender: FrameSender, closer: Producer) {
        self.sender = Some(sender);
        self.closer = Some(closer);
    }

    async fn work(&mut self, frame: Frame) {
        let Some(sender) = self.sender.as_ref() else {
            return;
        };
        match frame.opcode {
            OpCode::Close => {
                let _ = sender.send(Frame::close(close_code::NORMAL_CLOSURE)).await;
                if let Some(closer) = &self.closer {
                    closer.close();
                }
            }
            OpCode::Ping => {
                let mut pong = frame;
                pong.opcode = OpCode::Pong;
                let _ = sender.send(pong).await;
            }
            _ => {
                let _ = sender.send(frame).await;
            }
        }
    }

    async fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::io::AsyncReadExt;
    use std::sync::Arc;

    async fn connected_pair() -> (Producer, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server_sock, _) = listener.accept().await.unwrap();
        (Producer::new(Arc::new(server_sock)), client.await.unwrap())
    }

    #[tokio::test]
    async fn echoes_text_frame() {
        let (producer, mut client) = connected_pair().await;
        let sender = FrameSender::new(producer.clone());
        let mut worker = EchoWorker::default();
        worker.initialize(sender, producer).await;

        worker.work(Frame::text(Bytes::from_static(b"hi"))).await;

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x81, 0x02, b'h', b'i']);
    }

    #[tokio::test]
    async fn replies_to_close_with_close_and_closes_connection() {
        let (producer, mut client) = connected_pair().await;
        let sender = FrameSender::new(producer.clone());
        let mut worker = EchoWorker::default();
        worker.initialize(sender, producer.clone()).await;

        worker.work(Frame::close(close_code::NORMAL_CLOSURE)).await;

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf[0] & 0x0F, OpCode::Close.to_nibble());
        assert!(producer.is_closed());
    }
}
