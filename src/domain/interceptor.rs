use hyper::HeaderMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout_at;
use tracing::{debug, error};

use super::response::{respond_bad_gateway, respond_ok};
use super::{is_idled, ResponseOrder, Result, TunnelError, TunnelRequest, TunnelSession};
use crate::adapters::BidiCopy;
use crate::ports::{BorrowedBuffer, BoxedStream, BufferSource, DefaultBufferSource, DialerPort, Relay, ResponseSink};

/// Turns CONNECT requests into raw tunnels.
///
/// Built once and shared by every session; it holds no per-session state.
pub struct ConnectInterceptor {
    idle_timeout: Duration,
    buffer_source: Arc<dyn BufferSource>,
    response_order: ResponseOrder,
    dialer: Arc<dyn DialerPort>,
    relay: Arc<dyn Relay>,
}

pub struct ConnectInterceptorBuilder {
    idle_timeout: Duration,
    buffer_source: Option<Arc<dyn BufferSource>>,
    response_order: ResponseOrder,
    dialer: Arc<dyn DialerPort>,
    relay: Option<Arc<dyn Relay>>,
}

impl ConnectInterceptorBuilder {
    /// Advertised to clients through `Keep-Alive`. Zero disables it.
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn buffer_source(mut self, buffer_source: Arc<dyn BufferSource>) -> Self {
        self.buffer_source = Some(buffer_source);
        self
    }

    pub fn ok_waits_for_upstream(self, ok_waits_for_upstream: bool) -> Self {
        self.response_order(ResponseOrder::from_ok_waits_for_upstream(ok_waits_for_upstream))
    }

    pub fn response_order(mut self, response_order: ResponseOrder) -> Self {
        self.response_order = response_order;
        self
    }

    pub fn relay(mut self, relay: Arc<dyn Relay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn build(self) -> ConnectInterceptor {
        ConnectInterceptor {
            idle_timeout: self.idle_timeout,
            buffer_source: self.buffer_source.unwrap_or_else(|| Arc::new(DefaultBufferSource)),
            response_order: self.response_order,
            dialer: self.dialer,
            relay: self.relay.unwrap_or_else(|| Arc::new(BidiCopy)),
        }
    }
}

impl ConnectInterceptor {
    pub fn builder(dialer: Arc<dyn DialerPort>) -> ConnectInterceptorBuilder {
        ConnectInterceptorBuilder {
            idle_timeout: Duration::ZERO,
            buffer_source: None,
            response_order: ResponseOrder::default(),
            dialer,
            relay: None,
        }
    }

    /// Services one CONNECT request until the tunnel is torn down.
    ///
    /// Whatever was acquired (the hijacked downstream, the dialed upstream,
    /// relay buffers) is released before this returns.
    pub async fn connect(&self, sink: &mut dyn ResponseSink, mut req: TunnelRequest) -> Result<()> {
        let downstream = self.hijack(sink).await?;

        let mut session = TunnelSession::new(downstream);
        let result = self.tunnel(&mut session, sink.headers_mut(), &mut req).await;
        session.close().await;

        result
    }

    async fn hijack(&self, sink: &mut dyn ResponseSink) -> Result<BoxedStream> {
        // Only fails when the connection was already taken or answered,
        // which is a bug in the caller.
        sink.hijack().await.map_err(|err| {
            error!("{}", err);
            err
        })
    }

    async fn tunnel(
        &self,
        session: &mut TunnelSession,
        headers: &mut HeaderMap,
        req: &mut TunnelRequest,
    ) -> Result<()> {
        if self.response_order == ResponseOrder::RespondBeforeDial {
            self.respond_ok(session, req, headers).await?;
        }

        let upstream = match self.dial(req).await {
            Ok(upstream) => upstream,
            Err(err) => {
                match self.response_order {
                    ResponseOrder::RespondAfterDial => {
                        if let Some(downstream) = session.downstream() {
                            if let Err(write_err) =
                                respond_bad_gateway(downstream, req, headers, err.sanitized()).await
                            {
                                debug!("Unable to respond BadGateway: {}", write_err);
                            }
                        }
                    }
                    ResponseOrder::RespondBeforeDial => error!("{}", err),
                }
                return Err(err);
            }
        };
        session.attach_upstream(upstream);

        if self.response_order == ResponseOrder::RespondAfterDial {
            self.respond_ok(session, req, headers).await?;
        }

        self.copy(session).await
    }

    async fn respond_ok(
        &self,
        session: &mut TunnelSession,
        req: &mut TunnelRequest,
        headers: &mut HeaderMap,
    ) -> Result<()> {
        let downstream = session
            .downstream()
            .ok_or_else(|| TunnelError::Respond("OK: downstream already closed".into()))?;

        respond_ok(downstream, req, headers, self.idle_timeout)
            .await
            .map_err(|err| {
                let err = TunnelError::Respond(format!("OK: {}", err));
                error!("{}", err);
                err
            })
    }

    async fn dial(&self, req: &TunnelRequest) -> Result<BoxedStream> {
        let target = req.target_addr();
        let dial = self.dialer.dial("tcp", target);

        let outcome = match req.deadline {
            Some(deadline) => match timeout_at(deadline, dial).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(TunnelError::DialTimeout {
                        target: target.to_string(),
                    })
                }
            },
            None => dial.await,
        };

        outcome.map_err(|err| TunnelError::dial(target, &err))
    }

    async fn copy(&self, session: &mut TunnelSession) -> Result<()> {
        let (downstream, upstream) = session
            .both()
            .ok_or_else(|| TunnelError::PipeUpstream("tunnel has only one side".into()))?;

        let mut buf_out = BorrowedBuffer::borrow_from(&self.buffer_source);
        let mut buf_in = BorrowedBuffer::borrow_from(&self.buffer_source);

        let (to_upstream, to_downstream) = self
            .relay
            .relay(downstream, upstream, &mut buf_out[..], &mut buf_in[..])
            .await;

        classify_relay_outcome(to_upstream, to_downstream)
    }
}

/// Drops the errors a tunnel is expected to end with.
///
/// End of stream and idled connections are normal on both sides. A broken
/// pipe towards downstream means the client went away first.
pub fn classify_relay_outcome(to_upstream: io::Result<u64>, to_downstream: io::Result<u64>) -> Result<()> {
    if let Err(err) = to_downstream {
        if !is_benign(&err) && err.kind() != io::ErrorKind::BrokenPipe {
            return Err(TunnelError::PipeDownstream(err.to_string()));
        }
    }

    if let Err(err) = to_upstream {
        if !is_benign(&err) {
            return Err(TunnelError::PipeUpstream(err.to_string()));
        }
    }

    Ok(())
}

fn is_benign(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::UnexpectedEof || is_idled(err)
}
