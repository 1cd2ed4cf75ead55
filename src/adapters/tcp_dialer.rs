use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::IdleTimeout;
use crate::domain::redact::hide;
use crate::ports::{BoxedStream, DialerPort};

/// Dials upstream directly over TCP.
///
/// Errors keep their `io::ErrorKind` but only name the address in clear; the
/// OS diagnostic is hidden so it can be logged without reaching clients.
#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    connect_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
}

impl TcpDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = Some(connect_timeout);
        self
    }

    /// Wrap dialed connections in [`IdleTimeout`]. Zero leaves them unwrapped.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout).filter(|idle| !idle.is_zero());
        self
    }
}

#[async_trait]
impl DialerPort for TcpDialer {
    async fn dial(&self, network: &str, address: &str) -> io::Result<BoxedStream> {
        if network != "tcp" {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported network {}", network),
            ));
        }

        let connect = TcpStream::connect(address);
        let stream = match self.connect_timeout {
            Some(limit) => match timeout(limit, connect).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("timed out reaching {}", address),
                    ))
                }
            },
            None => connect.await,
        }
        .map_err(|err| unreachable(address, err))?;

        if let Err(err) = stream.set_nodelay(true) {
            debug!("Unable to set TCP_NODELAY towards {}: {}", address, err);
        }
        debug!("Connected to {} ({:?})", address, stream.peer_addr().ok());

        match self.idle_timeout {
            Some(idle) => Ok(Box::new(IdleTimeout::new(stream, idle))),
            None => Ok(Box::new(stream)),
        }
    }
}

fn unreachable(address: &str, err: io::Error) -> io::Error {
    io::Error::new(
        err.kind(),
        format!("unable to reach {}{}", address, hide(format!(": {}", err))),
    )
}
