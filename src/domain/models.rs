use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::http::uri::Authority;
use hyper::{Method, Request};
use std::io;
use tokio::time::Instant;

use super::{Result, TunnelError};

pub type RequestBody = BoxBody<Bytes, io::Error>;

/// When the `200` answer goes out relative to dialing upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrder {
    /// Answer as soon as the connection is hijacked. A failed dial then
    /// shows up to the client only as the connection closing.
    #[default]
    RespondBeforeDial,
    /// Answer once upstream is connected, or with `502` if the dial failed.
    RespondAfterDial,
}

impl ResponseOrder {
    pub fn from_ok_waits_for_upstream(ok_waits_for_upstream: bool) -> Self {
        if ok_waits_for_upstream {
            ResponseOrder::RespondAfterDial
        } else {
            ResponseOrder::RespondBeforeDial
        }
    }
}

pub struct TunnelRequest {
    pub target: Authority,
    pub deadline: Option<Instant>,
    pub body: Option<RequestBody>,
}

impl TunnelRequest {
    pub fn new(target: Authority) -> Self {
        Self {
            target,
            deadline: None,
            body: None,
        }
    }

    /// Build from a parsed CONNECT request.
    ///
    /// The target comes from the request-target authority only. The `Host`
    /// header is left alone since intermediaries may rewrite it independently
    /// of where the tunnel actually goes.
    pub fn from_http<B>(req: Request<B>) -> Result<Self> {
        if req.method() != Method::CONNECT {
            return Err(TunnelError::InvalidRequest(format!(
                "expected CONNECT, got {}",
                req.method()
            )));
        }

        let (parts, _) = req.into_parts();
        let target = parts
            .uri
            .authority()
            .cloned()
            .ok_or_else(|| TunnelError::InvalidRequest(format!("missing authority in {}", parts.uri)))?;

        if target.port_u16().is_none() {
            return Err(TunnelError::InvalidRequest(format!("missing port in {}", target)));
        }

        Ok(Self::new(target))
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn target_addr(&self) -> &str {
        self.target.as_str()
    }
}
