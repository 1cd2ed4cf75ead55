use async_trait::async_trait;
use std::io;

use super::BoxedStream;

/// Port for opening the upstream side of a tunnel
#[async_trait]
pub trait DialerPort: Send + Sync {
    /// Connect to `address` (`host:port`) over `network`.
    ///
    /// Dropping the returned future must abandon the attempt; callers rely on
    /// that to enforce their deadline.
    async fn dial(&self, network: &str, address: &str) -> io::Result<BoxedStream>;
}
