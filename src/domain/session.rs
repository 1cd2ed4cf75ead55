use tokio::io::AsyncWriteExt;
use tracing::trace;

use crate::ports::BoxedStream;

/// The connections a single CONNECT call holds.
///
/// Each side is only present once acquired and is taken out when closed, so
/// it gets closed at most once. Dropping the session without calling
/// [`TunnelSession::close`] still releases both sockets.
pub struct TunnelSession {
    downstream: Option<BoxedStream>,
    upstream: Option<BoxedStream>,
}

impl TunnelSession {
    pub fn new(downstream: BoxedStream) -> Self {
        Self {
            downstream: Some(downstream),
            upstream: None,
        }
    }

    pub fn downstream(&mut self) -> Option<&mut BoxedStream> {
        self.downstream.as_mut()
    }

    pub fn attach_upstream(&mut self, upstream: BoxedStream) {
        self.upstream = Some(upstream);
    }

    /// Both ends, in `(downstream, upstream)` order, once both are held.
    pub fn both(&mut self) -> Option<(&mut BoxedStream, &mut BoxedStream)> {
        match (self.downstream.as_mut(), self.upstream.as_mut()) {
            (Some(downstream), Some(upstream)) => Some((downstream, upstream)),
            _ => None,
        }
    }

    pub async fn close(&mut self) {
        if let Some(mut downstream) = self.downstream.take() {
            if let Err(err) = downstream.shutdown().await {
                trace!("Error closing downstream connection: {}", err);
            }
        }
        if let Some(mut upstream) = self.upstream.take() {
            if let Err(err) = upstream.shutdown().await {
                trace!("Error closing upstream connection: {}", err);
            }
        }
    }
}
