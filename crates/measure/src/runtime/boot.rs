//! Boot — logging init and run timing.

use std::time::{Duration, Instant};

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Initialise the tracing / logging subsystem.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(conf: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| conf.level.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);
    match conf.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Logs start and completion of a named task with the elapsed time.
pub struct Timer {
    header: String,
    started: Instant,
}

impl Timer {
    pub fn start(header: impl Into<String>) -> Self {
        let header = header.into();
        info!("{} start", header);
        Self {
            header,
            started: Instant::now(),
        }
    }

    pub fn stop(self) -> Duration {
        let elapsed = self.started.elapsed();
        info!(elapsed_ms = elapsed.as_millis() as u64, "{} done", self.header);
        elapsed
    }
}
