//! Initialization of the global tracing subscriber.
//!
//! Console output is filtered by [`CONSOLE_LOG_LEVEL`], rolling JSON log files
//! (if enabled) by [`FILE_LOG_LEVEL`]. Both default to `INFO`.

use std::path::PathBuf;

use snafu::{ResultExt, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::Directive, layer::SubscriberExt};

/// The environment variable used to set the console log level filter.
pub const CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";

/// The environment variable used to set the rolling file log level filter.
pub const FILE_LOG_LEVEL: &str = "FILE_LOG_LEVEL";

const FILE_LOG_SUFFIX: &str = "tracing-rs.json";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to initialize rolling file appender"))]
    InitRollingFileAppender { source: InitError },

    #[snafu(display("unable to set the global default subscriber"))]
    SetGlobalDefaultSubscriber { source: SetGlobalDefaultError },
}

#[derive(clap::Args, Debug, Default, PartialEq, Eq)]
pub struct LoggingOptions {
    /// Disable console logs.
    #[arg(long, env)]
    pub console_log_disabled: bool,

    /// Enable logging to files located in the specified DIRECTORY.
    #[arg(long, env, value_name = "DIRECTORY", group = "file_log")]
    pub file_log_directory: Option<PathBuf>,

    /// Time PERIOD after which log files are rolled over.
    #[arg(long, env, value_name = "PERIOD", requires = "file_log")]
    pub file_log_rotation_period: Option<RotationPeriod>,
}

/// Supported periods when the log file is rolled over.
#[derive(
    clap::ValueEnum, Clone, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "PascalCase")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,

    #[default]
    Never,
}

impl From<RotationPeriod> for Rotation {
    fn from(value: RotationPeriod) -> Self {
        match value {
            RotationPeriod::Minutely => Self::MINUTELY,
            RotationPeriod::Hourly => Self::HOURLY,
            RotationPeriod::Daily => Self::DAILY,
            RotationPeriod::Never => Self::NEVER,
        }
    }
}

/// Installs the global subscriber for `app_name`.
///
/// Must be called at most once per process, later calls fail with
/// [`Error::SetGlobalDefaultSubscriber`].
pub fn initialize_logging(app_name: &str, options: &LoggingOptions) -> Result<(), Error> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Sync + Send>> = Vec::new();

    if !options.console_log_disabled {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_filter(env_filter(CONSOLE_LOG_LEVEL, LevelFilter::INFO))
                .boxed(),
        );
    }

    if let Some(file_log_directory) = &options.file_log_directory {
        let rotation_period = options.file_log_rotation_period.clone().unwrap_or_default();
        let file_appender = RollingFileAppender::builder()
            .rotation(rotation_period.into())
            .filename_prefix(app_name)
            .filename_suffix(FILE_LOG_SUFFIX)
            .build(file_log_directory)
            .context(InitRollingFileAppenderSnafu)?;

        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_appender)
                .with_filter(env_filter(FILE_LOG_LEVEL, LevelFilter::INFO))
                .boxed(),
        );
    }

    if !layers.is_empty() {
        tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layers))
            .context(SetGlobalDefaultSubscriberSnafu)?;
    }

    tracing::debug!(
        app_name,
        console_log_disabled = options.console_log_disabled,
        file_log_directory = ?options.file_log_directory,
        "initialized logging"
    );
    Ok(())
}

fn env_filter(env_var: &str, default_directive: impl Into<Directive>) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(env_var)
        .with_default_directive(default_directive.into())
        .from_env_lossy()
}
