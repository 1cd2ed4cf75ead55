//! A minimal HTTP/1.x front end that hands CONNECT requests to the interceptor.
//!
//! Request heads are parsed by hand so the connection stays a plain byte
//! stream that can be hijacked before any response is written.

mod request;
mod server;
mod sink;

pub use request::{read_request_head, MAX_HEADERS, MAX_HEAD_BYTES};
pub use server::TunnelServer;
pub use sink::RawResponseSink;
