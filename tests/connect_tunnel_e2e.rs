mod e2e_utils;

use e2e_utils::tunnel_server::read_to_end;
use e2e_utils::{EchoServer, TestTunnelServer};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

#[tokio::test]
async fn test_connect_relays_to_upstream() {
    let echo = EchoServer::start().await.expect("Failed to start echo server");
    let tunnel = TestTunnelServer::start(false, Duration::ZERO)
        .await
        .expect("Failed to start tunnel server");

    let (head, mut conn) = tunnel.connect(&echo.addr().to_string()).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "Expected 200, got: {}", head);
    assert!(!head.contains("Content-Length"), "2xx CONNECT must not carry a length: {}", head);
    assert!(!head.contains("Keep-Alive"), "No idle timeout configured: {}", head);

    conn.write_all(b"hello through the tunnel").await.unwrap();
    let mut buf = [0u8; 24];
    timeout(Duration::from_secs(5), conn.read_exact(&mut buf))
        .await
        .expect("Echo should come back within timeout")
        .unwrap();
    assert_eq!(&buf, b"hello through the tunnel");
}

#[tokio::test]
async fn test_ok_waits_for_upstream_and_keeps_alive() {
    let echo = EchoServer::start().await.unwrap();
    let tunnel = TestTunnelServer::start(true, Duration::from_secs(30)).await.unwrap();

    let (head, mut conn) = tunnel.connect(&echo.addr().to_string()).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "Expected 200, got: {}", head);
    assert!(head.contains("Keep-Alive: timeout=28\r\n"), "Missing keep-alive: {}", head);

    conn.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
}

#[tokio::test]
async fn test_unreachable_upstream_gets_sanitized_bad_gateway() {
    let tunnel = TestTunnelServer::start(true, Duration::ZERO).await.unwrap();
    let target = closed_port().await;

    let (head, mut conn) = tunnel.connect(&target).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 502 Bad Gateway\r\n"), "Expected 502, got: {}", head);

    let body = timeout(Duration::from_secs(5), read_to_end(&mut conn)).await.unwrap();
    assert_eq!(body, format!("unable to reach {}", target));
}

#[tokio::test]
async fn test_unreachable_upstream_closes_after_early_ok() {
    let tunnel = TestTunnelServer::start(false, Duration::ZERO).await.unwrap();
    let target = closed_port().await;

    let (head, mut conn) = tunnel.connect(&target).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "Expected early 200, got: {}", head);

    let rest = timeout(Duration::from_secs(5), read_to_end(&mut conn)).await.unwrap();
    assert!(rest.is_empty(), "Nothing should follow the early 200: {:?}", rest);
}

#[tokio::test]
async fn test_plain_requests_are_refused() {
    let tunnel = TestTunnelServer::start(false, Duration::ZERO).await.unwrap();

    let mut stream = TcpStream::connect(tunnel.addr()).await.unwrap();
    stream
        .write_all(b"GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"), "Got: {}", response);
}

#[tokio::test]
async fn test_upstream_close_tears_down_the_tunnel() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = listener.local_addr().unwrap().to_string();
    let upstream = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"bye").await.unwrap();
    });

    let tunnel = TestTunnelServer::start(true, Duration::ZERO).await.unwrap();
    let (head, mut conn) = tunnel.connect(&target).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "Got: {}", head);

    let rest = timeout(Duration::from_secs(5), read_to_end(&mut conn)).await.unwrap();
    assert_eq!(rest, "bye");
    upstream.await.unwrap();
}

#[tokio::test]
async fn test_half_closed_client_gets_upstream_reply() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = listener.local_addr().unwrap().to_string();
    let upstream = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        socket.read_to_end(&mut request).await.unwrap();
        socket.write_all(b"response").await.unwrap();
        request
    });

    let tunnel = TestTunnelServer::start(true, Duration::ZERO).await.unwrap();
    let (head, mut conn) = tunnel.connect(&target).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "Got: {}", head);

    conn.get_mut().write_all(b"request").await.unwrap();
    conn.get_mut().shutdown().await.unwrap();

    let rest = timeout(Duration::from_secs(5), read_to_end(&mut conn)).await.unwrap();
    assert_eq!(rest, "response");
    assert_eq!(upstream.await.unwrap(), b"request");
}
