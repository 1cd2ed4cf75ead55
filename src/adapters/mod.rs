pub mod buffer_pool;
pub mod idle_timing;
pub mod raw_server;
pub mod relay;
pub mod tcp_dialer;

pub use buffer_pool::PooledBufferSource;
pub use idle_timing::IdleTimeout;
pub use raw_server::{read_request_head, RawResponseSink, TunnelServer};
pub use relay::BidiCopy;
pub use tcp_dialer::TcpDialer;
