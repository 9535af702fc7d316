use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable.
pub fn init(json: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt.json().with_current_span(true).with_span_list(true))
            .try_init()
            .ok();
    } else {
        registry.with(fmt).try_init().ok();
    }

    Ok(())
}
