use async_trait::async_trait;
use hyper::HeaderMap;

use super::BoxedStream;
use crate::domain::Result;

/// The response side of an HTTP exchange that can give up its raw connection
#[async_trait]
pub trait ResponseSink: Send {
    /// Headers to send along with whatever response ends up being written
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Take the underlying connection out of the HTTP layer.
    ///
    /// Succeeds at most once. Fails if the connection was already taken or
    /// if a response was already written through the normal path.
    async fn hijack(&mut self) -> Result<BoxedStream>;
}
