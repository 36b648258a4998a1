use clap::Args;

use crate::logging::LoggingOptions;

/// Options of the provider process, usable as CLI arguments or environment variables.
#[derive(Debug, PartialEq, Eq, Args)]
#[command(next_help_heading = "Provider Options")]
pub struct ProviderOptions {
    /// Maximum time to wait for the OpenAPI schema document of the Kubernetes API server.
    #[arg(long, env, default_value = "30s")]
    pub schema_fetch_timeout: humantime::Duration,

    /// Skip the checks which need to query the Kubernetes API server, for example
    /// the namespace check of resources.
    #[arg(long, env)]
    pub online_validation_disabled: bool,

    // IMPORTANT: All (flattened) sub structs should be placed at the end to ensure the help
    // headings are correct.
    #[command(flatten)]
    pub logging: LoggingOptions,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::{CommandFactory, Parser};

    use super::*;
    use crate::logging::RotationPeriod;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        options: ProviderOptions,
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["manifest-provider"]).expect("no arguments are required");

        assert_eq!(
            Duration::from(cli.options.schema_fetch_timeout),
            Duration::from_secs(30)
        );
        assert!(!cli.options.online_validation_disabled);
        assert_eq!(cli.options.logging, LoggingOptions::default());
    }

    #[test]
    fn parse_arguments() {
        let cli = Cli::try_parse_from([
            "manifest-provider",
            "--schema-fetch-timeout",
            "1m 30s",
            "--online-validation-disabled",
            "--file-log-directory",
            "/logs",
            "--file-log-rotation-period",
            "daily",
        ])
        .expect("arguments are valid");

        assert_eq!(
            Duration::from(cli.options.schema_fetch_timeout),
            Duration::from_secs(90)
        );
        assert!(cli.options.online_validation_disabled);
        assert_eq!(
            cli.options.logging.file_log_rotation_period,
            Some(RotationPeriod::Daily)
        );
    }

    #[test]
    fn rotation_period_requires_directory() {
        Cli::try_parse_from(["manifest-provider", "--file-log-rotation-period", "daily"])
            .expect_err("rotation period without a log directory is rejected");
    }
}
