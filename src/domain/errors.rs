use std::fmt;
use std::io;

use super::redact::{self, Sanitized};

#[derive(Debug, Clone)]
pub enum TunnelError {
    InvalidRequest(String),
    Hijack(String),
    Respond(String),
    Dial { target: String, detail: String },
    DialTimeout { target: String },
    PipeDownstream(String),
    PipeUpstream(String),
    Config(String),
}

impl TunnelError {
    pub fn dial(target: &str, err: &io::Error) -> Self {
        TunnelError::Dial {
            target: target.to_string(),
            detail: err.to_string(),
        }
    }

    /// Text that may cross the trust boundary to the client.
    ///
    /// Dial failures expose only what the dialer left outside of hidden
    /// markers; everything else is cleaned from its rendered message.
    pub fn sanitized(&self) -> Sanitized {
        match self {
            TunnelError::Dial { detail, .. } => Sanitized::new(detail),
            other => Sanitized::new(&other.to_string()),
        }
    }
}

impl fmt::Display for TunnelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            TunnelError::Hijack(msg) => write!(f, "Unable to hijack connection: {}", msg),
            TunnelError::Respond(msg) => write!(f, "Unable to respond {}", msg),
            TunnelError::Dial { target, detail } => {
                write!(f, "Unable to dial {}: {}", target, redact::reveal(detail))
            }
            TunnelError::DialTimeout { target } => write!(f, "Timed out dialing {}", target),
            TunnelError::PipeDownstream(msg) => write!(f, "Error piping data to downstream: {}", msg),
            TunnelError::PipeUpstream(msg) => write!(f, "Error piping data to upstream: {}", msg),
            TunnelError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for TunnelError {}

pub type Result<T> = std::result::Result<T, TunnelError>;

/// Sentinel carried by I/O errors raised when a connection sat idle past its timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Idled;

impl fmt::Display for Idled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection idled")
    }
}

impl std::error::Error for Idled {}

impl Idled {
    pub fn into_io_error(self) -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, self)
    }
}

pub fn is_idled(err: &io::Error) -> bool {
    err.get_ref().map(|inner| inner.is::<Idled>()).unwrap_or(false)
}
