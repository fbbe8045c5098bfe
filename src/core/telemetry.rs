use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// RUST_LOG wins when set; otherwise the configured level applies to
/// this crate while the chattier dependencies are capped at warn, which
/// keeps the correction long-poll from flooding the log at debug.
pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let default_directives = format!(
        "bacportal={level},tower_http={level},sqlx=warn,hyper=warn,reqwest=warn",
        level = settings.telemetry().log_level
    );
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let builder = fmt().with_env_filter(filter).with_target(false);

    if settings.telemetry().json {
        builder
            .json()
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    } else {
        builder
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    }

    Ok(())
}
