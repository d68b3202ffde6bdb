use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

fn level_for(verbose: bool) -> (LevelFilter, &'static str) {
    if verbose {
        (LevelFilter::DEBUG, "debug")
    } else {
        (LevelFilter::WARN, "warn")
    }
}

/// Per-target cap for the crate. Skipped when `RUST_LOG` supplies its own directives.
fn app_targets(verbose: bool, env_override: bool) -> Option<Targets> {
    if env_override {
        return None;
    }
    let (level_filter, _) = level_for(verbose);
    Some(
        Targets::new()
            .with_target("stockpulse", level_filter)
            .with_default(LevelFilter::WARN),
    )
}

pub fn init_logging(verbose: bool) {
    let (_, level) = level_for(verbose);
    let env_filter = EnvFilter::try_from_default_env().ok();
    let app_filter = app_targets(verbose, env_filter.is_some());
    let env_filter = env_filter.unwrap_or_else(|| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time().with_writer(std::io::stderr))
        .with(app_filter)
        .with(env_filter)
        .init();
}
