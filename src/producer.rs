//! The socket producer: the object a [`crate::consumer::Consumer`] writes
//! outbound bytes through. Wraps the accepted socket and guarantees the
//! underlying fd is closed exactly once no matter how many tasks race to
//! close it.

use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Notify;

use crate::error::Error;

/// A non-owning handle to an accepted socket's write side. Cloning shares
/// the same underlying stream and close state; the connection (not the
/// producer) is what keeps the socket alive.
#[derive(Clone)]
pub struct Producer {
    stream: Arc<TcpStream>,
    closed: Arc<AtomicBool>,
    close_notify: Arc<Notify>,
}

impl Producer {
    pub(crate) fn new(stream: Arc<TcpStream>) -> Self {
        Producer {
            stream,
            closed: Arc::new(AtomicBool::new(false)),
            close_notify: Arc::new(Notify::new()),
        }
    }

    /// Writes every byte of `bytes`, looping over short writes. Returns
    /// the number of bytes written (always `bytes.len()` on success).
    pub async fn write(&self, bytes: &[u8]) -> Result<usize, Error> {
        if self.is_closed() {
            return Err(Error::ConnectionIo(std::io::Error::from(
                std::io::ErrorKind::NotConnected,
            )));
        }
        let mut sent = 0;
        while sent < bytes.len() {
            let n = (&*self.stream).write(&bytes[sent..]).await?;
            if n == 0 {
                return Err(Error::ConnectionIo(std::io::Error::from(
                    std::io::ErrorKind::WriteZero,
                )));
            }
            sent += n;
        }
        Ok(sent)
    }

    /// Closes the socket. Idempotent: only the first caller actually
    /// shuts the socket down; later callers are no-ops, and all callers
    /// observe the close-notification being signaled.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let _ = self.stream.shutdown(Shutdown::Both);
            self.close_notify.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once [`Producer::close`] has run to completion (from any
    /// caller). Used by the per-connection shutdown task to race the
    /// server-wide stop signal against this connection ending on its own.
    ///
    /// The `Notified` future is created *before* the `is_closed` check, not
    /// after: `Notify::notify_waiters` only wakes futures that already
    /// exist, so if `close` ran between a check and a later `notified()`
    /// call, this would wait forever for a notification that already
    /// happened. Creating it first lets it observe a racing close even
    /// though it isn't polled until the check has failed.
    pub(crate) async fn closed_notified(&self) {
        let notified = self.close_notify.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    pub(crate) fn stream(&self) -> &Arc<TcpStream> {
        &self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server_sock, _) = listener.accept().await.unwrap();
        let _client = client.await.unwrap();

        let producer = Producer::new(Arc::new(server_sock));
        producer.close();
        producer.close();
        assert!(producer.is_closed());
    }

    #[tokio::test]
    async fn write_after_close_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server_sock, _) = listener.accept().await.unwrap();
        let _client = client.await.unwrap();

        let producer = Producer::new(Arc::new(server_sock));
        producer.close();
        assert!(producer.write(b"hi").await.is_err());
    }
}
