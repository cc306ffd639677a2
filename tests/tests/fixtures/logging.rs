use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

/// Write logs of every test into one file per hour, under `dir`.
pub fn init_file_logging(app_name: &str, dir: &str, level: &str) -> (WorkerGuard, impl Subscriber + Send + Sync) {
    let file_appender = RollingFileAppender::new(Rotation::HOURLY, dir, app_name);
    let (writer, writer_guard) = tracing_appender::non_blocking(file_appender);

    let f_layer = fmt::Layer::new().with_span_events(fmt::format::FmtSpan::FULL).with_writer(writer).with_ansi(false);

    // Use `RUST_LOG` if it is set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = Registry::default().with(filter).with(f_layer);

    (writer_guard, subscriber)
}
