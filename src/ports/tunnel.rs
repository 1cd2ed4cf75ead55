use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// A raw duplex byte stream taking part in a tunnel
pub trait TunnelStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> TunnelStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type BoxedStream = Box<dyn TunnelStream>;

/// Port for relaying bytes between the two ends of a tunnel (for CONNECT method)
#[async_trait]
pub trait Relay: Send + Sync {
    /// Copy `a` -> `b` through `buf_ab` and `b` -> `a` through `buf_ba`, both
    /// directions concurrently.
    ///
    /// Returns only once neither direction is running any more, with the
    /// outcome of each direction in `(a -> b, b -> a)` order.
    async fn relay(
        &self,
        a: &mut BoxedStream,
        b: &mut BoxedStream,
        buf_ab: &mut [u8],
        buf_ba: &mut [u8],
    ) -> (io::Result<u64>, io::Result<u64>);
}
