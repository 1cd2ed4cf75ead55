use hyper::header::{HeaderValue, ALLOW};
use hyper::{Method, StatusCode};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::time::{sleep, Instant};
use tracing::{debug, field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::{read_request_head, RawResponseSink};
use crate::adapters::IdleTimeout;
use crate::domain::{is_idled, ConnectInterceptor, TunnelError, TunnelRequest};
use crate::ports::{BoxedStream, ResponseSink, TunnelStream};

/// Accepts client connections and runs each CONNECT through the interceptor.
pub struct TunnelServer {
    interceptor: Arc<ConnectInterceptor>,
    idle_timeout: Duration,
    dial_timeout: Option<Duration>,
}

impl TunnelServer {
    pub fn new(interceptor: Arc<ConnectInterceptor>) -> Self {
        Self {
            interceptor,
            idle_timeout: Duration::ZERO,
            dial_timeout: None,
        }
    }

    /// Close client connections quiet for longer than `idle_timeout`. Zero disables it.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Deadline given to each dial, counted from when the request head was read.
    pub fn with_dial_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = Some(dial_timeout).filter(|limit| !limit.is_zero());
        self
    }

    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        info!("Listening on {}", listener.local_addr()?);

        loop {
            let (socket, peer) = accept_with_backoff(|| listener.accept()).await;

            if let Err(err) = socket.set_nodelay(true) {
                debug!("Unable to set TCP_NODELAY for {}: {}", peer, err);
            }

            let server = self.clone();
            tokio::spawn(async move {
                server.handle_connection(socket, peer).await;
            });
        }
    }

    /// Serves a single client connection until its tunnel, if any, is torn down.
    pub async fn handle_connection<S>(&self, socket: S, peer: SocketAddr)
    where
        S: TunnelStream + 'static,
    {
        let conn: BoxedStream = if self.idle_timeout.is_zero() {
            Box::new(socket)
        } else {
            Box::new(IdleTimeout::new(socket, self.idle_timeout))
        };

        let id = Uuid::new_v4();
        let span = info_span!("tunnel", %id, %peer, authority = field::Empty);
        self.serve_connection(conn).instrument(span).await
    }

    async fn serve_connection(&self, conn: BoxedStream) {
        let mut reader = BufReader::new(conn);

        let head = match read_request_head(&mut reader).await {
            Ok(head) => head,
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                debug!("Malformed request: {}", err);
                let mut sink = RawResponseSink::new(reader);
                reply(&mut sink, StatusCode::BAD_REQUEST, "Bad Request").await;
                return;
            }
            Err(err) if is_idled(&err) => {
                debug!("Client idled before sending a request");
                return;
            }
            Err(err) => {
                debug!("Client left without a complete request: {}", err);
                return;
            }
        };

        let mut sink = RawResponseSink::new(reader);

        if head.method() != Method::CONNECT {
            debug!("Refusing {} {}", head.method(), head.uri());
            sink.headers_mut()
                .insert(ALLOW, HeaderValue::from_static("CONNECT"));
            reply(&mut sink, StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").await;
            return;
        }

        let mut req = match TunnelRequest::from_http(head) {
            Ok(req) => req,
            Err(err) => {
                debug!("{}", err);
                reply(&mut sink, StatusCode::BAD_REQUEST, err.sanitized().as_str()).await;
                return;
            }
        };
        if let Some(deadline) = self.dial_timeout.and_then(|limit| Instant::now().checked_add(limit)) {
            req = req.with_deadline(deadline);
        }

        Span::current().record("authority", field::display(&req.target));
        info!("CONNECT {}", req.target);

        match self.interceptor.connect(&mut sink, req).await {
            Ok(()) => debug!("Tunnel closed"),
            Err(err @ (TunnelError::PipeDownstream(_) | TunnelError::PipeUpstream(_))) => warn!("{}", err),
            Err(err) => debug!("Tunnel ended early: {}", err),
        }
    }
}

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

async fn accept_with_backoff<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(err) => {
                warn!("Unable to accept connection: {}", err);
                sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn reply<S>(sink: &mut RawResponseSink<S>, status: StatusCode, text: &str)
where
    S: TunnelStream + 'static,
{
    if let Err(err) = sink.respond(status, text).await {
        debug!("Unable to respond {}: {}", status, err);
    }
}
