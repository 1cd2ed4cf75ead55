use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use connect_tunnel::adapters::{PooledBufferSource, TcpDialer, TunnelServer};
use connect_tunnel::domain::ConnectInterceptor;
use connect_tunnel::ports::{BufferSource, DefaultBufferSource, DEFAULT_BUFFER_SIZE};
use connect_tunnel::settings::Settings;

#[derive(Parser, Debug)]
#[clap(version = env!("CARGO_PKG_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
pub struct Opts {
    /// listen on this network address
    #[clap(long, short = 'b')]
    bind: Option<String>,

    /// Drop connections idle for this many seconds (0 disables)
    #[clap(long)]
    idle_timeout: Option<u64>,

    /// Give up reaching upstream after this many seconds (0 disables)
    #[clap(long)]
    dial_timeout: Option<u64>,

    /// Only answer 200 once upstream is connected, and 502 when it cannot be
    #[clap(long)]
    ok_waits_for_upstream: bool,

    /// Relay buffers kept for reuse across tunnels
    #[clap(long)]
    pool_capacity: Option<usize>,

    /// Configuration file
    #[clap(long, short = 'c')]
    config: Option<PathBuf>,
}

impl Opts {
    fn apply(&self, settings: &mut Settings) {
        if let Some(bind) = &self.bind {
            settings.bind = bind.clone();
        }
        if let Some(idle_timeout) = self.idle_timeout {
            settings.idle_timeout_secs = idle_timeout;
        }
        if let Some(dial_timeout) = self.dial_timeout {
            settings.dial_timeout_secs = dial_timeout;
        }
        if self.ok_waits_for_upstream {
            settings.ok_waits_for_upstream = true;
        }
        if let Some(pool_capacity) = self.pool_capacity {
            settings.pool_capacity = pool_capacity;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Opts::parse();
    let mut settings = Settings::load(opts.config.as_deref())?;
    opts.apply(&mut settings);
    settings.validate()?;

    match rlimit::increase_nofile_limit(u64::MAX) {
        Ok(limit) => info!("Open files limit set to {}", limit),
        Err(err) => warn!("Unable to raise open files limit: {}", err),
    }

    let buffer_source: Arc<dyn BufferSource> =
        if settings.pool_capacity > 0 || settings.buffer_size != DEFAULT_BUFFER_SIZE {
            Arc::new(PooledBufferSource::new(settings.buffer_size, settings.pool_capacity))
        } else {
            Arc::new(DefaultBufferSource)
        };

    let dialer = TcpDialer::new().with_idle_timeout(settings.idle_timeout());
    let interceptor = ConnectInterceptor::builder(Arc::new(dialer))
        .idle_timeout(settings.idle_timeout())
        .ok_waits_for_upstream(settings.ok_waits_for_upstream)
        .buffer_source(buffer_source)
        .build();

    let server = Arc::new(
        TunnelServer::new(Arc::new(interceptor))
            .with_idle_timeout(settings.idle_timeout())
            .with_dial_timeout(settings.dial_timeout()),
    );

    let bind: SocketAddr = settings.bind.parse()?;
    let listener = TcpListener::bind(bind).await?;
    server.serve(listener).await?;
    Ok(())
}
