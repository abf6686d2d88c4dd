//! End-to-end scenarios 3, 4, and 5 from the design spec: the HTTP→
//! WebSocket handshake, a masked frame round-trip with mixed reserved
//! bits, and a 64-bit extended-length frame.

use std::sync::Arc;

use pipeworks::consumer::{HandlerOutcome, HttpHandler, HttpWsConsumer};
use pipeworks::http::{self, HttpRequest, HttpResponse};
use pipeworks::ws::{accept_key, EchoWorker, Frame, FrameParser, OpCode};
use pipeworks::Server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn upgrade_handler() -> HttpHandler {
    Arc::new(|request: Option<HttpRequest>| {
        Box::pin(async move {
            let request = request.expect("well-formed request");
            let key = http::header_value(&request.headers, "Sec-WebSocket-Key")
                .expect("client sends Sec-WebSocket-Key")
                .to_string();
            let response = HttpResponse::new(
                101,
                vec![
                    ("Upgrade".to_string(), "websocket".to_string()),
                    ("Connection".to_string(), "Upgrade".to_string()),
                    ("Sec-WebSocket-Accept".to_string(), accept_key(&key)),
                ],
                Default::default(),
            );
            HandlerOutcome {
                response: Some(response),
                ws_worker: Some(Box::new(EchoWorker::default())),
            }
        })
    })
}

async fn start_server() -> (Server, std::net::SocketAddr) {
    let handler = upgrade_handler();
    let server = Server::bind(("127.0.0.1", 0), move |producer| {
        Some(HttpWsConsumer::new(producer, handler.clone()))
    })
    .await
    .unwrap();
    let addr = server.local_addr();
    (server, addr)
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
        assert!(n > 0);
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[tokio::test]
async fn handshake_produces_rfc6455_worked_example_accept_key() {
    let (server, addr) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let req = HttpRequest {
        method: "GET".to_string(),
        target: "/".to_string(),
        headers: vec![
            ("Upgrade".to_string(), "websocket".to_string()),
            ("Connection".to_string(), "Upgrade".to_string()),
            (
                "Sec-WebSocket-Key".to_string(),
                "dGhlIHNhbXBsZSBub25jZQ==".to_string(),
            ),
        ],
        body: Default::default(),
    };
    stream.write_all(&http::serialize_request(&req)).await.unwrap();

    let resp = read_one_response(&mut stream).await;
    assert_eq!(resp.code, 101);
    assert_eq!(
        http::header_value(&resp.headers, "Sec-WebSocket-Accept"),
        Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")
    );

    server.stop().await;
}

async fn handshake(stream: &mut TcpStream) {
    let req = HttpRequest {
        method: "GET".to_string(),
        target: "/".to_string(),
        headers: vec![
            ("Upgrade".to_string(), "websocket".to_string()),
            ("Connection".to_string(), "Upgrade".to_string()),
            (
                "Sec-WebSocket-Key".to_string(),
                "dGhlIHNhbXBsZSBub25jZQ==".to_string(),
            ),
        ],
        body: Default::default(),
    };
    stream.write_all(&http::serialize_request(&req)).await.unwrap();
    let resp = read_one_response(stream).await;
    assert_eq!(resp.code, 101);
}

async fn read_one_frame(stream: &mut TcpStream, parser: &mut FrameParser) -> Frame {
    let mut chunk = [0u8; 4096];
    loop {
        let mut frames = parser.parse();
        if !frames.is_empty() {
            return frames.remove(0);
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0);
        parser.write(&chunk[..n]);
    }
}

#[tokio::test]
async fn masked_frame_with_mixed_reserved_bits_round_trips() {
    let (server, addr) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    handshake(&mut stream).await;

    let frame = Frame {
        fin: false,
        rsv1: true,
        rsv2: false,
        rsv3: true,
        opcode: OpCode::Reserved(0x7),
        mask: Some([0x01, 0x02, 0x03, 0x04]),
        payload: bytes::Bytes::from_static(&[1, 2, 3, 4, 5]),
    };
    // fin=0, rsv={1,0,1} -> 0x57; opcode 0x7 -> byte 0 = 0x57.
    let wire = pipeworks::ws::serialize_frame(&frame);
    assert_eq!(wire[0], 0x57);
    assert_eq!(wire[1], 0x85);
    assert_eq!(&wire[2..6], &[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(&wire[6..], &[0x00, 0x00, 0x00, 0x00, 0x04]);

    stream.write_all(&wire).await.unwrap();

    let mut parser = FrameParser::new();
    let echoed = read_one_frame(&mut stream, &mut parser).await;
    assert_eq!(echoed.opcode, OpCode::Reserved(0x7));
    assert_eq!(&echoed.payload[..], &[1, 2, 3, 4, 5]);
    assert_eq!(echoed.fin, false);
    assert_eq!((echoed.rsv1, echoed.rsv2, echoed.rsv3), (true, false, true));

    server.stop().await;
}

#[tokio::test]
async fn long_frame_length_round_trips() {
    let (server, addr) = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    handshake(&mut stream).await;

    let payload = vec![0x42u8; 0x10101];
    let mut header = vec![0x82u8, 0x80 | 127];
    header.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    let mask = [0x01, 0x02, 0x03, 0x04];
    header.extend_from_slice(&mask);
    let masked: Vec<u8> = payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]).collect();

    stream.write_all(&header).await.unwrap();
    stream.write_all(&masked).await.unwrap();

    let mut parser = FrameParser::new();
    let echoed = read_one_frame(&mut stream, &mut parser).await;
    assert_eq!(echoed.payload.len(), payload.len());
    assert_eq!(&echoed.payload[..], &payload[..]);

    server.stop().await;
}
