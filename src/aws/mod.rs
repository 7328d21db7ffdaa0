//! AWS data collectors built on the AWS CLI
//!
//! Each collector runs one or more CLI calls, deserializes the output into
//! raw structs, projects them to the handful of fields worth sending to the
//! model and serializes that projection. Failures never leave this module as
//! errors: [`summarize`] turns them into a readable message that takes the
//! place of the data.

pub mod advisor;
pub mod cli;
pub mod cost_explorer;
pub mod credentials;
#[cfg(all(test, unix))]
pub mod fake;
pub mod iam;
pub mod lambda;
pub mod logs;
pub mod security_hub;
pub mod terraform;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::error::CommandError;

pub use cli::AwsCli;
pub use credentials::AwsCredentials;

/// A field the upstream tool may or may not have reported
#[derive(Debug, Clone, PartialEq)]
pub enum Reported<T> {
    Value(T),
    Unknown,
}

impl<T> From<Option<T>> for Reported<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Reported::Value(v),
            None => Reported::Unknown,
        }
    }
}

impl<T: Serialize> Serialize for Reported<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reported::Value(v) => v.serialize(serializer),
            Reported::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

/// Deserialize an optional field, treating a value of the wrong shape as absent
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Render a collector result as the text embedded in the prompt
pub fn summarize<T: Serialize>(surface: &str, result: Result<T, CommandError>) -> String {
    match result {
        Ok(summary) => serde_json::to_string_pretty(&summary)
            .unwrap_or_else(|e| format!("Error collecting {} data: {}", surface, e)),
        Err(e) => {
            warn!("{} collector failed: {}", surface, e);
            format!("Error collecting {} data: {}", surface, e)
        }
    }
}

/// Secondary calls degrade to an empty object
pub fn or_empty<T: Serialize>(what: &str, result: Result<T, CommandError>) -> serde_json::Value {
    let value = result
        .map_err(|e| e.to_string())
        .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string()));
    value.unwrap_or_else(|e| {
        debug!("Dropping {}: {}", what, e);
        serde_json::Value::Object(Default::default())
    })
}
