//! Error types shared across the tool

use std::path::PathBuf;
use thiserror::Error;

/// Configuration problems that abort the whole invocation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No API key configured. Set OPENAI_API_KEY, pass --api-key or run 'aws-insights configure'")]
    MissingApiKey,

    #[error("Live mode requested but no AWS credentials found. Set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or run 'aws-insights configure'")]
    LiveModeWithoutCredentials,

    #[error("Could not determine a home directory for the config file")]
    NoHomeDirectory,

    #[error("Failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {path}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failures of an external command invocation
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("'{program}' returned invalid JSON: {source}")]
    InvalidJson {
        program: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
