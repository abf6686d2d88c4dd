//! Minimal demonstration binary: binds a `pipeworks::Server` to an HTTP
//! handler that echoes the request body back as a `200`, and upgrades to
//! a WebSocket echo worker on request.
//!
//! Usage: `echo_server [host] [port]` (defaults to `127.0.0.1:8080`).
//! No CLI-parsing crate is used — argument handling stays a thin
//! collaborator, per this crate's scope.

use std::sync::Arc;

use pipeworks::consumer::{HandlerOutcome, HttpHandler, HttpWsConsumer};
use pipeworks::http::{self, HttpRequest, HttpResponse};
use pipeworks::ws::{accept_key, EchoWorker};
use pipeworks::Server;

fn echo_handler() -> HttpHandler {
    Arc::new(|request: Option<HttpRequest>| {
        Box::pin(async move {
            let Some(request) = request else {
                return HandlerOutcome {
                    response: Some(HttpResponse::new(400, Vec::new(), Default::default())),
                    ws_worker: None,
                };
            };

            let wants_websocket = http::header_value(&request.headers, "Upgrade")
                .map(|v| v.eq_ignore_ascii_case("websocket"))
                .unwrap_or(false);

            if wants_websocket {
                let Some(key) = http::header_value(&request.headers, "Sec-WebSocket-Key") else {
                    return HandlerOutcome {
                        response: Some(HttpResponse::new(400, Vec::new(), Default::default())),
                        ws_worker: None,
                    };
                };
                let response = HttpResponse::new(
                    101,
                    vec![
                        ("Upgrade".to_string(), "websocket".to_string()),
                        ("Connection".to_string(), "Upgrade".to_string()),
                        ("Sec-WebSocket-Accept".to_string(), accept_key(key)),
                    ],
                    Default::default(),
                );
                return HandlerOutcome {
                    response: Some(response),
                    ws_worker: Some(Box::new(EchoWorker::default())),
                };
            }

            let headers = vec![("Content-Length".to_string(), request.body.len().to_string())];
            HandlerOutcome {
                response: Some(HttpResponse::new(200, headers, request.body)),
                ws_worker: None,
            }
        })
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = args.next().and_then(|p| p.parse().ok()).unwrap_or(8080);

    let handler = echo_handler();
    let server = Server::bind((host.as_str(), port), move |producer| {
        Some(HttpWsConsumer::new(producer, handler.clone()))
    })
    .await
    .expect("failed to bind server");

    tracing::info!(addr = %server.local_addr(), "listening");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
    tracing::info!("shutting down");
    server.stop().await;
}
