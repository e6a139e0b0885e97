pub mod job_log;

pub use job_log::{JobLogGuard, JobLogSink};

use crate::config::Logging;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the console layer plus a file layer that writes into `sink`
/// while a job log is attached.
pub fn init(settings: &Logging, sink: JobLogSink) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(sink),
        )
        .try_init()
}
