//! The connection server core.
//!
//! A [`Server`] accepts TCP connections and hands each one off to a
//! per-connection [`Consumer`] built by a factory closure. It owns three
//! kinds of fiber: a single accept fiber, and per connection a reader
//! fiber and a shutdown-listener fiber.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pipeworks::consumer::{HandlerOutcome, HttpHandler, HttpWsConsumer};
//! use pipeworks::http::HttpResponse;
//! use pipeworks::Server;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let handler: HttpHandler = Arc::new(|_req| {
//!     Box::pin(async move {
//!         HandlerOutcome {
//!             response: Some(HttpResponse::new(200, Vec::new(), Default::default())),
//!             ws_worker: None,
//!         }
//!     })
//! });
//!
//! let server = Server::bind(("127.0.0.1", 0), move |producer| {
//!     Some(HttpWsConsumer::new(producer, handler.clone()))
//! })
//! .await
//! .unwrap();
//!
//! // ... accept traffic ...
//! server.stop().await;
//! # }
//! ```

mod shutdown;

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tracing::Instrument;

use crate::consumer::Consumer;
use crate::error::Error;
use crate::producer::Producer;

use self::shutdown::{FiberCounter, FiberGuard};

/// A running server: owns the listening socket's lifetime and the
/// graceful-shutdown coordination for every fiber it has spawned.
pub struct Server {
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    counter: Arc<FiberCounter>,
    stopping: Arc<AtomicBool>,
}

impl Server {
    /// Binds a TCP listener at `addr` and starts accepting connections.
    /// `consumer_factory` is called once per accepted socket with its
    /// [`Producer`]; returning `None` refuses the connection (the socket
    /// is closed immediately, no reader/shutdown fiber spawned).
    pub async fn bind<A, F, C>(addr: A, consumer_factory: F) -> Result<Self, Error>
    where
        A: ToSocketAddrs,
        F: Fn(Producer) -> Option<C> + Send + Sync + 'static,
        C: Consumer + 'static,
    {
        let listener = TcpListener::bind(addr).await.map_err(Error::Bind)?;
        let local_addr = listener.local_addr().map_err(Error::Bind)?;

        let (stop_tx, stop_rx) = shutdown::stop_channel();
        let counter = FiberCounter::new();
        let factory = Arc::new(consumer_factory);

        let accept_guard = counter.guard();
        let accept_counter = counter.clone();
        let accept_stop_rx = stop_rx;
        tokio::spawn(accept_loop(
            listener,
            factory,
            accept_stop_rx,
            accept_counter,
            accept_guard,
        ));

        tracing::info!(addr = %local_addr, "server listening");

        Ok(Server {
            local_addr,
            stop_tx,
            counter,
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The address the listener is bound to — useful when `bind` was
    /// called with port `0` to let the OS choose one.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the server: idempotent, blocks until every fiber the server
    /// has spawned (accept, and every connection's reader and shutdown
    /// fiber) has exited. Only the first concurrent caller performs the
    /// teardown; every caller — first or not — returns only once it has
    /// completed.
    pub async fn stop(&self) {
        if self
            .stopping
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!("server stopping");
            let _ = self.stop_tx.send(true);
        }
        self.counter.wait_idle().await;
    }
}

async fn accept_loop<F, C>(
    listener: TcpListener,
    factory: Arc<F>,
    mut stop_rx: watch::Receiver<bool>,
    counter: Arc<FiberCounter>,
    _guard: FiberGuard,
) where
    F: Fn(Producer) -> Option<C> + Send + Sync + 'static,
    C: Consumer + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                tracing::debug!("accept loop observed stop signal");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        spawn_connection(stream, peer, &factory, stop_rx.clone(), &counter);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "accept failed, stopping accept loop");
                        break;
                    }
                }
            }
        }
    }
}

fn spawn_connection<F, C>(
    stream: TcpStream,
    peer: SocketAddr,
    factory: &Arc<F>,
    stop_rx: watch::Receiver<bool>,
    counter: &Arc<FiberCounter>,
) where
    F: Fn(Producer) -> Option<C> + Send + Sync + 'static,
    C: Consumer + 'static,
{
    let stream = Arc::new(stream);
    let producer = Producer::new(stream.clone());

    let Some(consumer) = factory(producer.clone()) else {
        tracing::debug!(%peer, "consumer factory refused connection");
        producer.close();
        return;
    };

    // Shutdown fiber: races the server-wide stop signal against this
    // connection's own close notification; either closes the socket.
    let shutdown_guard = counter.guard();
    let shutdown_producer = producer.clone();
    let mut shutdown_stop_rx = stop_rx;
    tokio::spawn(async move {
        let _guard = shutdown_guard;
        tokio::select! {
            _ = shutdown_stop_rx.changed() => {}
            _ = shutdown_producer.closed_notified() => {}
        }
        shutdown_producer.close();
    });

    // Reader fiber: reads, hands every chunk to the consumer
    // synchronously (this is the connection's only back-pressure path —
    // no more bytes are read from the socket until `consumer.write`
    // resolves), and closes on EOF or any error.
    let reader_guard = counter.guard();
    let span = tracing::info_span!("connection", %peer);
    tokio::spawn(
        async move {
            let _guard = reader_guard;
            run_reader(stream, producer, consumer).await;
        }
        .instrument(span),
    );
}

async fn run_reader<C: Consumer>(stream: Arc<TcpStream>, producer: Producer, mut consumer: C) {
    tracing::debug!("connection started");
    let mut buf = [0u8; 8192];
    loop {
        let n = match (&*stream).read(&mut buf).await {
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "connection read failed");
                consumer.close_with_error(Error::ConnectionIo(err));
                producer.close();
                return;
            }
        };
        if n == 0 {
            tracing::debug!("connection closed by peer");
            consumer.close_with_error(Error::ConnectionIo(io::Error::from(
                io::ErrorKind::UnexpectedEof,
            )));
            producer.close();
            return;
        }
        if let Err(err) = consumer.write(&buf[..n]).await {
            tracing::warn!(error = %err, "consumer write failed");
            consumer.close_with_error(err);
            producer.close();
            return;
        }
    }
}
