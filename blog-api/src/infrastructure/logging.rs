use crate::infrastructure::config::Environment;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,blog_api=debug";

/// Human-readable output locally, one JSON object per line everywhere else.
pub fn init_logging(environment: Environment) {
    let structured = environment != Environment::Local;

    let json_layer = structured.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
    });

    let text_layer = (!structured).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
    });

    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(json_layer)
        .with(text_layer)
        .init();

    tracing::info!(%environment, "Logging initialized");
}
