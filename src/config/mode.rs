//! Live/offline decision

use clap::ValueEnum;

use crate::aws::credentials::AwsCredentials;
use crate::error::ConfigError;

/// Requested operating mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Live when AWS credentials are available
    #[default]
    Auto,
    /// Always call AWS; fail without credentials
    Live,
    /// Never call AWS
    Offline,
}

/// Whether AWS calls are permitted for this invocation
pub fn decide(credentials: Option<&AwsCredentials>, mode: Mode) -> Result<bool, ConfigError> {
    match mode {
        Mode::Offline => Ok(false),
        Mode::Live if credentials.is_some() => Ok(true),
        Mode::Live => Err(ConfigError::LiveModeWithoutCredentials),
        Mode::Auto => Ok(credentials.is_some()),
    }
}
