use async_trait::async_trait;
use hyper::header::{HeaderValue, CONNECTION, CONTENT_TYPE};
use hyper::{HeaderMap, StatusCode};
use std::io;
use std::mem;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::domain::response::write_response;
use crate::domain::{Result, TunnelError};
use crate::ports::{BoxedStream, ResponseSink};

enum SinkState<S> {
    Attached(BufReader<S>),
    Hijacked,
    Responded,
}

/// Response side of a connection read by [`super::read_request_head`].
///
/// Either answers through [`RawResponseSink::respond`] or gives the
/// connection away through [`ResponseSink::hijack`], never both. Bytes the
/// client pipelined after the request head travel with the hijacked stream.
pub struct RawResponseSink<S> {
    headers: HeaderMap,
    state: SinkState<S>,
}

impl<S> RawResponseSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(conn: BufReader<S>) -> Self {
        Self {
            headers: HeaderMap::new(),
            state: SinkState::Attached(conn),
        }
    }

    pub fn is_hijacked(&self) -> bool {
        matches!(self.state, SinkState::Hijacked)
    }

    /// Writes a plain-text response and closes the connection.
    pub async fn respond(&mut self, status: StatusCode, text: &str) -> io::Result<()> {
        let mut conn = match mem::replace(&mut self.state, SinkState::Responded) {
            SinkState::Attached(conn) => conn,
            other => {
                self.state = other;
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "connection is no longer attached to this response",
                ));
            }
        };

        self.headers.insert(CONNECTION, HeaderValue::from_static("close"));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));

        write_response(&mut conn, status, &self.headers, Some(text.as_bytes())).await?;
        conn.shutdown().await
    }
}

#[async_trait]
impl<S> ResponseSink for RawResponseSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    async fn hijack(&mut self) -> Result<BoxedStream> {
        match mem::replace(&mut self.state, SinkState::Hijacked) {
            SinkState::Attached(conn) => Ok(Box::new(conn)),
            SinkState::Hijacked => Err(TunnelError::Hijack("connection already hijacked".into())),
            SinkState::Responded => {
                self.state = SinkState::Responded;
                Err(TunnelError::Hijack("response already written".into()))
            }
        }
    }
}
