//! Project-wide utility for initializing tracing output.
use serde::Deserialize;
use snafu::ResultExt;
use std::str::FromStr;
use tracing::Subscriber;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, EnvFilter, Registry};

const DEFAULT_TRACING_FILTER_DIRECTIVE: LevelFilter = LevelFilter::INFO;

pub const TRACING_FILTER_DIRECTIVE_ENV_VAR: &str = "TRACING_FILTER_DIRECTIVE";

/// The message format for logging tracing events.
///
/// See https://docs.rs/tracing-subscriber/latest/tracing_subscriber/fmt/format/index.html
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    /// Human-readable, single-line logs for each event.
    Full,
    /// A variant of the default formatter optimized for short line lengths.
    Compact,
    /// Pretty-formatted multi-line logs optimized for human readability.
    Pretty,
    /// Newline-delimited JSON logs.
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryConfigError;

    fn from_str(s: &str) -> Result<Self> {
        serde_plain::from_str(&s.to_lowercase()).context(error::LogFormatSnafu {
            value: s.to_string(),
        })
    }
}

/// Installs the global tracing subscriber.
///
/// Filtering is read from `TRACING_FILTER_DIRECTIVE` using `EnvFilter` syntax and falls back to `info`.
pub fn init_logging(format: LogFormat, ansi_enabled: bool) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(DEFAULT_TRACING_FILTER_DIRECTIVE.into())
        .with_env_var(TRACING_FILTER_DIRECTIVE_ENV_VAR)
        .from_env_lossy();

    let subscriber = with_format_layer(Registry::default().with(env_filter), format, ansi_enabled);

    tracing::subscriber::set_global_default(subscriber)
        .context(error::TracingConfigurationSnafu)?;

    Ok(())
}

/// Adds a formatting layer to a tracing event subscriber.
fn with_format_layer<S>(
    event_subscriber: S,
    format: LogFormat,
    ansi_enabled: bool,
) -> Box<dyn Subscriber + Send + Sync>
where
    S: SubscriberExt + Send + Sync + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    // Each layer is a distinct type, so the subscriber is boxed per arm.
    match format {
        LogFormat::Full => Box::new(event_subscriber.with(fmt::layer().with_ansi(ansi_enabled))),
        LogFormat::Compact => {
            Box::new(event_subscriber.with(fmt::layer().compact().with_ansi(ansi_enabled)))
        }
        LogFormat::Pretty => {
            Box::new(event_subscriber.with(fmt::layer().pretty().with_ansi(ansi_enabled)))
        }
        LogFormat::Json => {
            Box::new(event_subscriber.with(fmt::layer().json().with_ansi(ansi_enabled)))
        }
    }
}

pub mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum TelemetryConfigError {
        #[snafu(display("Error configuring tracing: '{}'", source))]
        TracingConfiguration {
            source: tracing::subscriber::SetGlobalDefaultError,
        },

        #[snafu(display(
            "Unknown log format '{}', expected one of full, compact, pretty, json: '{}'",
            value,
            source
        ))]
        LogFormat {
            source: serde_plain::Error,
            value: String,
        },
    }
}

type Result<T> = std::result::Result<T, TelemetryConfigError>;
pub use error::TelemetryConfigError;
