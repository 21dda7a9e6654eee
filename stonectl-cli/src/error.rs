//! CLI error type.

use std::fmt;

use stonectl::check::CheckError;
use stonectl::config::ConfigError;
use stonectl::launch::LaunchError;
use stonectl::logging::LoggingError;
use stonectl::manager::PipelineError;

/// Errors surfaced to the user. Every variant exits with status 1.
#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Pipeline(PipelineError),
    Check(CheckError),
    Launch(LaunchError),
    Output(String),
    /// The run finished but some components failed.
    Incomplete { failed: usize, total: usize },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Pipeline(e) => write!(f, "Installation aborted: {}", e),
            CliError::Check(e) => write!(f, "{}", e),
            CliError::Launch(e) => write!(f, "Invalid service: {}", e),
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
            CliError::Incomplete { failed, total } => {
                write!(f, "{} of {} components failed to install", failed, total)
            }
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

impl From<CheckError> for CliError {
    fn from(e: CheckError) -> Self {
        CliError::Check(e)
    }
}

impl From<LaunchError> for CliError {
    fn from(e: LaunchError) -> Self {
        CliError::Launch(e)
    }
}
