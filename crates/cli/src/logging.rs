use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::paths;

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn";
const LOG_FILE: &str = "client.log";

/// Keep alive for the life of the process; dropping it flushes the writer.
pub struct LoggingHandle {
    pub guard: WorkerGuard,
}

pub fn init_logging() -> anyhow::Result<LoggingHandle> {
    let log_dir = paths::log_dir()?;
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(LOG_FILE);

    let (filter, filter_source) = select_filter(&[
        std::env::var("TASKBOARD_LOG_FILTER").ok(),
        std::env::var("RUST_LOG").ok(),
    ]);

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let format = std::env::var("TASKBOARD_LOG_FORMAT").unwrap_or_else(|_| "json".into());

    let registry = tracing_subscriber::registry().with(filter);
    if format.eq_ignore_ascii_case("pretty") {
        registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .pretty()
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .flatten_event(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init()?;
    }

    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        log_path = %log_path.display(),
        format = %format,
        filter = %filter_source,
        pid = std::process::id(),
    );

    Ok(LoggingHandle { guard })
}

/// First candidate that parses as a filter, with the text it came from.
fn select_filter(candidates: &[Option<String>]) -> (EnvFilter, String) {
    candidates
        .iter()
        .flatten()
        .find_map(|value| {
            EnvFilter::try_new(value)
                .ok()
                .map(|filter| (filter, value.clone()))
        })
        .unwrap_or_else(|| (EnvFilter::new(DEFAULT_FILTER), DEFAULT_FILTER.to_string()))
}
