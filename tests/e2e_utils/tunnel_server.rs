#![cfg(test)]
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use connect_tunnel::adapters::{PooledBufferSource, TcpDialer, TunnelServer};
use connect_tunnel::domain::ConnectInterceptor;

pub struct TestTunnelServer {
    addr: SocketAddr,
    _server_handle: JoinHandle<()>,
}

impl TestTunnelServer {
    pub async fn start(
        ok_waits_for_upstream: bool,
        idle_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let dialer = TcpDialer::new()
            .with_connect_timeout(Duration::from_secs(5))
            .with_idle_timeout(idle_timeout);
        let interceptor = ConnectInterceptor::builder(Arc::new(dialer))
            .idle_timeout(idle_timeout)
            .ok_waits_for_upstream(ok_waits_for_upstream)
            .buffer_source(Arc::new(PooledBufferSource::with_capacity(4)))
            .build();
        let server = Arc::new(
            TunnelServer::new(Arc::new(interceptor))
                .with_idle_timeout(idle_timeout)
                .with_dial_timeout(Duration::from_secs(5)),
        );

        let server_handle = tokio::spawn(async move {
            // Silently stop in tests
            let _ = server.serve(listener).await;
        });

        Ok(Self {
            addr,
            _server_handle: server_handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends a CONNECT for `target` and returns the response head with the
    /// connection positioned right after it.
    pub async fn connect(&self, target: &str) -> Result<(String, BufReader<TcpStream>), Box<dyn std::error::Error>> {
        let mut stream = TcpStream::connect(self.addr).await?;
        let request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n");
        stream.write_all(request.as_bytes()).await?;

        let mut reader = BufReader::new(stream);
        let mut head = String::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                break;
            }
            head.push_str(&line);
            if line == "\r\n" {
                break;
            }
        }
        Ok((head, reader))
    }
}

/// Reads the body of a response whose head was already consumed, up to EOF.
pub async fn read_to_end(reader: &mut BufReader<TcpStream>) -> String {
    let mut body = String::new();
    let _ = reader.read_to_string(&mut body).await;
    body
}
