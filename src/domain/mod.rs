pub mod errors;
pub mod interceptor;
pub mod models;
pub mod redact;
pub mod response;
pub mod session;

pub use errors::*;
pub use interceptor::{classify_relay_outcome, ConnectInterceptor, ConnectInterceptorBuilder};
pub use models::*;
pub use redact::Sanitized;
pub use session::TunnelSession;
