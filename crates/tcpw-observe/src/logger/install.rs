use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, fmt::time::OffsetTime, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Install the global diagnostic subscriber described by `cfg`.
pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = filter(&cfg.level)?;
    let output = output_layer(cfg)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .map_err(|e| LoggerError::Install(e.to_string()))
}

fn output_layer<S>(cfg: &LoggerConfig) -> Result<BoxedLayer<S>, LoggerError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    // Standard output carries the journal; diagnostics never go there.
    let layer = match cfg.format {
        LoggerFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(timer())
            .boxed(),
        LoggerFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_target(cfg.with_targets)
            .with_timer(timer())
            .boxed(),
        LoggerFormat::Journald => journald()?,
    };
    Ok(layer)
}

fn filter(directives: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(directives).map_err(|e| LoggerError::InvalidFilter {
        filter: directives.to_string(),
        reason: e.to_string(),
    })
}

fn timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald<S>() -> Result<BoxedLayer<S>, LoggerError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_journald::layer()
        .map(|layer| layer.boxed())
        .map_err(|e| LoggerError::Install(format!("journald: {e}")))
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald<S>() -> Result<BoxedLayer<S>, LoggerError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    Err(LoggerError::JournaldUnavailable)
}
