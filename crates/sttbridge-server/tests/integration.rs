use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sttbridge_backend::NullBackend;
use sttbridge_bridge::SessionSettings;
use sttbridge_core::config::ServerConfig;
use sttbridge_server::{create_router, serve, AppState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start(static_dir: Option<PathBuf>) -> Self {
        let server_config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ws_path: "/ws/transcribe".to_string(),
            static_dir,
        };
        let state = AppState::new(Arc::new(NullBackend::new()), SessionSettings::default());
        let app = create_router(state, &server_config);

        let listener = TcpListener::bind(server_config.listen_addr()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, app, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(TIMEOUT, self.handle).await;
    }
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    tokio::time::timeout(TIMEOUT, stream.read_to_string(&mut response))
        .await
        .expect("http read timed out")
        .unwrap();
    response
}

async fn next_text<S>(ws: &mut S) -> String
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for transcript")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return text;
        }
    }
}

#[tokio::test]
async fn test_root_endpoint_reports_running() {
    let server = TestServer::start(None).await;
    let response = http_get(server.addr, "/").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("Speech-to-text bridge running"));
    server.stop().await;
}

#[tokio::test]
async fn test_websocket_audio_round_trip_through_null_backend() {
    let server = TestServer::start(None).await;
    let url = format!("ws://{}/ws/transcribe", server.addr);
    let (mut ws, _) = connect_async(url).await.expect("websocket connect failed");

    ws.send(Message::Binary(vec![0; 4])).await.unwrap();
    ws.send(Message::Binary(vec![0; 8])).await.unwrap();

    assert_eq!(next_text(&mut ws).await, r#"{"text":"[null] 4 bytes"}"#);
    assert_eq!(next_text(&mut ws).await, r#"{"text":"[null] 8 bytes"}"#);

    ws.close(None).await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_websocket_text_frames_are_ignored() {
    let server = TestServer::start(None).await;
    let url = format!("ws://{}/ws/transcribe", server.addr);
    let (mut ws, _) = connect_async(url).await.unwrap();

    ws.send(Message::Text("hello".to_string())).await.unwrap();
    ws.send(Message::Binary(vec![1; 6])).await.unwrap();

    assert_eq!(next_text(&mut ws).await, r#"{"text":"[null] 6 bytes"}"#);

    ws.close(None).await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_server_closes_socket_after_client_close() {
    let server = TestServer::start(None).await;
    let url = format!("ws://{}/ws/transcribe", server.addr);
    let (mut ws, _) = connect_async(url).await.unwrap();

    ws.close(None).await.unwrap();
    // Drain until the server side finishes the close handshake
    let end = tokio::time::timeout(TIMEOUT, async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
    assert!(end.is_ok(), "server never closed the socket");
    server.stop().await;
}

#[tokio::test]
async fn test_static_dir_is_served() {
    let dir = std::env::temp_dir().join("sttbridge_static_test");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("hello.txt"), "static hello").unwrap();

    let server = TestServer::start(Some(dir.clone())).await;
    let response = http_get(server.addr, "/static/hello.txt").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("static hello"));
    server.stop().await;

    std::fs::remove_dir_all(&dir).unwrap();
}
