use std::sync::Arc;

use time::{format_description, UtcOffset};
use tracing_subscriber::filter::dynamic_filter_fn;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_FILTER: &str = "watchtower=info,watchtower_core=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Logs go to stderr so command output on stdout stays pipeable.
pub fn init_logging() {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let attended = console::user_attended_stderr();

    #[allow(clippy::unwrap_used)] // constant format strings
    let (full_format, compact_format) = (
        format_description::parse("[day].[month].[year] [hour]:[minute]:[second]").unwrap(),
        format_description::parse("[hour]:[minute]:[second]").unwrap(),
    );

    let filter = Arc::new(env_filter());

    let full_fmt_layer = (!attended).then(|| {
        let filter = filter.clone();
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_timer(OffsetTime::new(offset, full_format))
            .with_filter(dynamic_filter_fn(move |m, c| filter.enabled(m, c.clone())))
    });

    let compact_fmt_layer = attended.then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .with_timer(OffsetTime::new(offset, compact_format))
            .with_filter(dynamic_filter_fn(move |m, c| filter.enabled(m, c.clone())))
    });

    tracing_subscriber::registry()
        .with(full_fmt_layer)
        .with(compact_fmt_layer)
        .init();
}
