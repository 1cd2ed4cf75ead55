//! Responses written straight onto a hijacked connection.

use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use hyper::{HeaderMap, StatusCode};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{Sanitized, TunnelRequest};

/// Seconds shaved off the advertised idle timeout so clients give up on the
/// connection before we do.
const KEEP_ALIVE_MARGIN_SECS: u64 = 2;

/// Tells the client when idle connections get closed. No-op when `idle_timeout` is zero.
pub fn add_idle_keep_alive(headers: &mut HeaderMap, idle_timeout: Duration) {
    if idle_timeout.is_zero() {
        return;
    }

    let secs = idle_timeout.as_secs().saturating_sub(KEEP_ALIVE_MARGIN_SECS);
    if let Ok(value) = HeaderValue::try_from(format!("timeout={}", secs)) {
        headers.insert(HeaderName::from_static("keep-alive"), value);
    }
}

pub async fn respond_ok<W>(
    writer: &mut W,
    req: &mut TunnelRequest,
    headers: &mut HeaderMap,
    idle_timeout: Duration,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    add_idle_keep_alive(headers, idle_timeout);
    respond_hijacked(writer, req, StatusCode::OK, headers, None).await
}

pub async fn respond_bad_gateway<W>(
    writer: &mut W,
    req: &mut TunnelRequest,
    headers: &HeaderMap,
    reason: Sanitized,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    debug!("Responding BadGateway: {}", reason);
    respond_hijacked(writer, req, StatusCode::BAD_GATEWAY, headers, Some(&reason.into_bytes())).await
}

/// Writes the response and then closes the request body, whatever the write outcome.
pub async fn respond_hijacked<W>(
    writer: &mut W,
    req: &mut TunnelRequest,
    status: StatusCode,
    headers: &HeaderMap,
    body: Option<&[u8]>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let result = write_response(writer, status, headers, body).await;

    if req.body.take().is_some() {
        debug!("Closed body of CONNECT request to {}", req.target);
    }

    result
}

/// Serializes a minimal HTTP/1.1 response.
///
/// `Content-Length` is only emitted alongside a body: a 2xx answer to
/// CONNECT must not carry one.
pub async fn write_response<W>(
    writer: &mut W,
    status: StatusCode,
    headers: &HeaderMap,
    body: Option<&[u8]>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .into_bytes();

    for (name, value) in headers {
        if name == CONTENT_LENGTH {
            continue;
        }
        head.extend_from_slice(title_case(name.as_str()).as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }

    if let Some(body) = body {
        head.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    head.extend_from_slice(b"\r\n");

    writer.write_all(&head).await?;
    if let Some(body) = body {
        writer.write_all(body).await?;
    }
    writer.flush().await
}

fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for ch in name.chars() {
        if upper {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
        upper = ch == '-';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::body::{Body, Bytes, Frame, SizeHint};
    use hyper::http::uri::Authority;
    use http_body_util::BodyExt;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    struct DropFlagBody(Arc<AtomicBool>);

    impl Body for DropFlagBody {
        type Data = Bytes;
        type Error = io::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
        ) -> Poll<Option<std::result::Result<Frame<Self::Data>, Self::Error>>> {
            Poll::Ready(None)
        }

        fn size_hint(&self) -> SizeHint {
            SizeHint::with_exact(0)
        }
    }

    impl Drop for DropFlagBody {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn request() -> TunnelRequest {
        TunnelRequest::new(Authority::from_static("example.com:443"))
    }

    #[tokio::test]
    async fn test_ok_response_has_no_body_or_length() {
        let mut out = Vec::new();
        let mut headers = HeaderMap::new();

        respond_ok(&mut out, &mut request(), &mut headers, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "HTTP/1.1 200 OK\r\n\r\n");
        assert!(headers.get("keep-alive").is_none());
    }

    #[tokio::test]
    async fn test_ok_response_advertises_idle_timeout() {
        let mut out = Vec::new();
        let mut headers = HeaderMap::new();

        respond_ok(&mut out, &mut request(), &mut headers, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "HTTP/1.1 200 OK\r\nKeep-Alive: timeout=58\r\n\r\n"
        );
        assert_eq!(headers["keep-alive"], "timeout=58");
    }

    #[test]
    fn test_keep_alive_margin_saturates() {
        let mut headers = HeaderMap::new();
        add_idle_keep_alive(&mut headers, Duration::from_millis(1500));
        assert_eq!(headers["keep-alive"], "timeout=0");
    }

    #[tokio::test]
    async fn test_bad_gateway_carries_sanitized_body() {
        let mut out = Vec::new();
        let mut headers = HeaderMap::new();
        headers.insert("x-proxy-id", HeaderValue::from_static("edge-1"));
        let reason = Sanitized::new(&format!("unable to reach db:5432{}", crate::domain::redact::hide(": refused")));

        respond_bad_gateway(&mut out, &mut request(), &headers, reason)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "HTTP/1.1 502 Bad Gateway\r\nX-Proxy-Id: edge-1\r\nContent-Length: 23\r\n\r\nunable to reach db:5432"
        );
    }

    #[tokio::test]
    async fn test_request_body_is_closed_even_when_write_fails() {
        let closed = Arc::new(AtomicBool::new(false));
        let mut req = request().with_body(DropFlagBody(closed.clone()).boxed());

        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let result = respond_hijacked(&mut server, &mut req, StatusCode::OK, &HeaderMap::new(), None).await;

        assert!(result.is_err());
        assert!(closed.load(Ordering::SeqCst));
        assert!(req.body.is_none());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("keep-alive"), "Keep-Alive");
        assert_eq!(title_case("x-forwarded-for"), "X-Forwarded-For");
        assert_eq!(title_case("via"), "Via");
    }
}
