//! End-to-end scenario 1 from the design spec: many concurrent
//! connections, each sending many requests, each echoed back exactly.

use std::sync::Arc;

use bytes::Bytes;
use pipeworks::consumer::{HandlerOutcome, HttpHandler, HttpWsConsumer};
use pipeworks::http::{self, HttpRequest, HttpResponse};
use pipeworks::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn echo_handler() -> HttpHandler {
    Arc::new(|request: Option<HttpRequest>| {
        Box::pin(async move {
            let request = request.expect("well-formed request");
            let headers = vec![("Content-Length".to_string(), request.body.len().to_string())];
            HandlerOutcome {
                response: Some(HttpResponse::new(200, headers, request.body)),
                ws_worker: None,
            }
        })
    })
}

async fn read_one_response(stream: &mut TcpStream) -> HttpResponse {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let (resp, _remaining, success) = http::parse_one_response(&buf);
        if success {
            if let Some(resp) = resp {
                return resp;
            }
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before a full response arrived");
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[tokio::test]
async fn echoes_request_body_across_many_connections_and_requests() {
    let handler = echo_handler();
    let server = Server::bind(("127.0.0.1", 0), move |producer| {
        Some(HttpWsConsumer::new(producer, handler.clone()))
    })
    .await
    .unwrap();
    let addr = server.local_addr();

    let mut clients = Vec::new();
    for conn_idx in 0..20u8 {
        clients.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            for i in 0..100u8 {
                let body = Bytes::copy_from_slice(&[
                    1u8.wrapping_add(conn_idx).wrapping_add(i),
                    2u8.wrapping_add(conn_idx).wrapping_add(i),
                    3u8.wrapping_add(conn_idx).wrapping_add(i),
                ]);
                let req = HttpRequest {
                    method: "POST".to_string(),
                    target: "/echo".to_string(),
                    headers: vec![(
                        "Content-Length".to_string(),
                        body.len().to_string(),
                    )],
                    body: body.clone(),
                };
                let raw = http::serialize_request(&req);
                stream.write_all(&raw).await.unwrap();

                let resp = read_one_response(&mut stream).await;
                assert_eq!(resp.code, 200);
                assert_eq!(resp.body, body);
            }
        }));
    }

    for client in clients {
        client.await.unwrap();
    }

    server.stop().await;
}

/// End-to-end scenario 6 from the design spec: graceful stop under load.
/// 20 clients stream echo requests in a loop; `stop` is invoked partway
/// through, and every client observes its connection ending (either a
/// clean EOF from the server's half-close, or an explicit read error)
/// within a bounded number of iterations, with `stop` only returning
/// once every per-connection fiber has actually exited.
#[tokio::test]
async fn stop_under_load_terminates_every_connection() {
    let handler = echo_handler();
    let server = Server::bind(("127.0.0.1", 0), move |producer| {
        Some(HttpWsConsumer::new(producer, handler.clone()))
    })
    .await
    .unwrap();
    let addr = server.local_addr();

    let mut clients = Vec::new();
    for _ in 0..20u8 {
        clients.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let body = Bytes::from_static(b"abc");
            loop {
                let req = HttpRequest {
                    method: "POST".to_string(),
                    target: "/echo".to_string(),
                    headers: vec![(
                        "Content-Length".to_string(),
                        body.len().to_string(),
                    )],
                    body: body.clone(),
                };
                if stream.write_all(&http::serialize_request(&req)).await.is_err() {
                    return;
                }

                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let (resp, _remaining, success) = http::parse_one_response(&buf);
                    if success && resp.is_some() {
                        break;
                    }
                    match stream.read(&mut chunk).await {
                        Ok(0) => return, // server closed the connection
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        Err(_) => return, // server reset the connection
                    }
                }
            }
        }));
    }

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    server.stop().await;

    for client in clients {
        client.await.unwrap();
    }
}
