//! The built-in HTTP/WebSocket consumer: the glue that binds the HTTP
//! codec and the WebSocket codec to one connection, per the state machine
//! in the design spec (`HTTP` then, optionally, `WEBSOCKET`).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::http::{self, HttpRequest, HttpResponse, RequestsParser};
use crate::producer::Producer;
use crate::ws::{FrameParser, FrameSender, WsWorker};

/// The capability set [`crate::server::Server`] feeds inbound socket
/// bytes to: one per connection, owned exclusively by the connection.
#[async_trait]
pub trait Consumer: Send {
    /// Feeds inbound socket bytes. Returns the number of bytes accepted
    /// (always all of them — back-pressure here comes from this call not
    /// returning yet, not from a short return value) or an error if the
    /// consumer cannot continue.
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, Error>;

    /// Terminates the consumer without a specific cause (the remote peer
    /// or the server is shutting down cleanly).
    fn close(&mut self);

    /// Terminates the consumer, attributing the shutdown to `err` (a
    /// socket read/write failure).
    fn close_with_error(&mut self, err: Error);
}

/// What an [`HttpHandler`] returns for one parsed (or malformed) request.
pub struct HandlerOutcome {
    /// `None` terminates the connection without a response.
    pub response: Option<HttpResponse>,
    /// `Some` only alongside a `101 Switching Protocols` response;
    /// transitions the consumer into the `WEBSOCKET` state.
    pub ws_worker: Option<Box<dyn WsWorker>>,
}

type HandlerFuture = Pin<Box<dyn Future<Output = HandlerOutcome> + Send>>;

/// `request = None` signals a framing error at that position in the
/// stream (the handler typically replies with a `400`).
pub type HttpHandler = Arc<dyn Fn(Option<HttpRequest>) -> HandlerFuture + Send + Sync>;

enum State {
    Http,
    WebSocket,
}

/// Binds [`HttpHandler`] to one connection. Starts in the `HTTP` state,
/// feeding bytes through an incremental [`RequestsParser`] and
/// dispatching each parsed request (or framing-error token) to the
/// handler in arrival order. If a handler response carries a
/// [`WsWorker`], the consumer swaps to the `WEBSOCKET` state and feeds
/// all further bytes through a [`FrameParser`] instead.
pub struct HttpWsConsumer {
    state: State,
    requests: RequestsParser,
    frames: FrameParser,
    handler: HttpHandler,
    producer: Producer,
    worker: Option<Box<dyn WsWorker>>,
}

impl HttpWsConsumer {
    pub fn new(producer: Producer, handler: HttpHandler) -> Self {
        HttpWsConsumer {
            state: State::Http,
            requests: RequestsParser::new(),
            frames: FrameParser::new(),
            handler,
            producer,
            worker: None,
        }
    }

    /// Dispatches one parsed request (or `None` for a framing error) to
    /// the handler, writes its response, and performs the WebSocket
    /// upgrade if the handler asked for one. Returns `false` if the
    /// connection should close (a `None` response).
    async fn handle_request(&mut self, request: Option<HttpRequest>) -> Result<bool, Error> {
        let outcome = (self.handler)(request).await;
        let Some(response) = outcome.response else {
            return Ok(false);
        };

        let bytes = http::serialize_response(&response);
        self.producer.write(&bytes).await?;

        if let Some(mut worker) = outcome.ws_worker {
            let sender = FrameSender::new(self.producer.clone());
            worker.initialize(sender, self.producer.clone()).await;
            self.worker = Some(worker);
            self.state = State::WebSocket;
        }
        Ok(true)
    }

    async fn feed_frames(&mut self, bytes: &[u8]) {
        self.frames.write(bytes);
        for frame in self.frames.parse() {
            if let Some(worker) = self.worker.as_mut() {
                worker.work(frame).await;
            }
        }
    }
}

#[async_trait]
impl Consumer for HttpWsConsumer {
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        let total = bytes.len();
        match self.state {
            State::Http => {
                self.requests.write(bytes);
                while let Some(record) = self.requests.parse_one() {
                    let keep_going = self.handle_request(record).await?;
                    if !keep_going {
                        self.close();
                        return Ok(total);
                    }
                    if matches!(self.state, State::WebSocket) {
                        // Bytes already buffered past the upgrading
                        // request belong to the frame parser, not to
                        // another round of HTTP parsing.
                        let leftover = self.requests.take_pending();
                        if !leftover.is_empty() {
                            self.feed_frames(&leftover).await;
                        }
                        break;
                    }
                }
            }
            State::WebSocket => {
                self.feed_frames(bytes).await;
            }
        }
        Ok(total)
    }

    fn close(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            tokio::spawn(async move {
                let _ = worker.close().await;
            });
        }
        self.producer.close();
    }

    fn close_with_error(&mut self, _err: Error) {
        self.close();
    }
}
