use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::{Result, TunnelError};
use crate::ports::DEFAULT_BUFFER_SIZE;

pub const APP_NAME: &str = "connect-tunnel";
/// Upper bound for the configurable timeouts, one year
pub const MAX_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;

/// Process configuration, persisted with `confy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind: String,
    /// Seconds without traffic before a connection is dropped, 0 disables it
    pub idle_timeout_secs: u64,
    /// Seconds allowed for reaching upstream, 0 disables it
    pub dial_timeout_secs: u64,
    pub ok_waits_for_upstream: bool,
    pub buffer_size: usize,
    /// Released relay buffers kept for reuse, 0 allocates per session
    pub pool_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8889".to_string(),
            idle_timeout_secs: 0,
            dial_timeout_secs: 30,
            ok_waits_for_upstream: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            pool_capacity: 0,
        }
    }
}

impl Settings {
    /// Loads from `path`, or from the per-user configuration directory.
    ///
    /// A missing file is created with the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let loaded = match path {
            Some(path) => confy::load_path(path),
            None => confy::load(APP_NAME, None),
        };
        let settings: Settings = loaded.map_err(|err| TunnelError::Config(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(TunnelError::Config("buffer_size must be positive".into()));
        }
        if self.bind.trim().is_empty() {
            return Err(TunnelError::Config("bind address is empty".into()));
        }
        for (name, secs) in [
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("dial_timeout_secs", self.dial_timeout_secs),
        ] {
            if secs > MAX_TIMEOUT_SECS {
                return Err(TunnelError::Config(format!(
                    "{} must be at most {}, got {}",
                    name, MAX_TIMEOUT_SECS, secs
                )));
            }
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }
}
