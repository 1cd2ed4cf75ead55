pub mod buffers;
pub mod dialer;
pub mod sink;
pub mod tunnel;

pub use buffers::{BorrowedBuffer, BufferSource, DefaultBufferSource, DEFAULT_BUFFER_SIZE};
pub use dialer::DialerPort;
pub use sink::ResponseSink;
pub use tunnel::{BoxedStream, Relay, TunnelStream};
