//! AWS credential unit resolution
//!
//! Supports:
//! - Environment variables (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN)
//! - The `credentials` object stored in the aws-insights config file
//!
//! Access key and secret key are only ever used together. Anything less than
//! both is treated as no credentials at all.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EnvLookup;

/// AWS credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

/// Credentials as found on disk, where any field may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl AwsCredentials {
    /// Build a unit from optional parts, rejecting partial or blank keys
    pub fn from_parts(
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        session_token: Option<String>,
    ) -> Option<Self> {
        let access_key_id = access_key_id.filter(|v| !v.trim().is_empty())?;
        let secret_access_key = secret_access_key.filter(|v| !v.trim().is_empty())?;

        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: session_token.filter(|v| !v.trim().is_empty()),
        })
    }

    /// Load credentials from environment variables
    pub fn from_env(env: &dyn EnvLookup) -> Option<Self> {
        let creds = Self::from_parts(
            env.get("AWS_ACCESS_KEY_ID"),
            env.get("AWS_SECRET_ACCESS_KEY"),
            env.get("AWS_SESSION_TOKEN"),
        );
        if creds.is_none()
            && (env.get("AWS_ACCESS_KEY_ID").is_some() || env.get("AWS_SECRET_ACCESS_KEY").is_some())
        {
            debug!("Ignoring partial AWS credentials in environment");
        }
        creds
    }

    /// Load credentials from the stored object, if it is complete
    pub fn from_stored(stored: &StoredCredentials) -> Option<Self> {
        Self::from_parts(
            stored.access_key_id.clone(),
            stored.secret_access_key.clone(),
            stored.session_token.clone(),
        )
    }

    /// Environment variables handed to AWS CLI child processes
    pub fn child_env(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            ("AWS_ACCESS_KEY_ID", self.access_key_id.clone()),
            ("AWS_SECRET_ACCESS_KEY", self.secret_access_key.clone()),
        ];
        if let Some(token) = &self.session_token {
            vars.push(("AWS_SESSION_TOKEN", token.clone()));
        }
        vars
    }

    /// Access key with everything but the last four characters hidden
    pub fn masked_access_key(&self) -> String {
        let tail: String = self
            .access_key_id
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{}", tail)
    }
}

impl From<&AwsCredentials> for StoredCredentials {
    fn from(creds: &AwsCredentials) -> Self {
        Self {
            access_key_id: Some(creds.access_key_id.clone()),
            secret_access_key: Some(creds.secret_access_key.clone()),
            session_token: creds.session_token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_unit_requires_both_keys() {
        let only_access = env(&[("AWS_ACCESS_KEY_ID", "AKIA1234")]);
        assert!(AwsCredentials::from_env(&only_access).is_none());

        let only_secret = env(&[("AWS_SECRET_ACCESS_KEY", "secret")]);
        assert!(AwsCredentials::from_env(&only_secret).is_none());

        let full = env(&[
            ("AWS_ACCESS_KEY_ID", "AKIA1234"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", "token"),
        ]);
        let creds = AwsCredentials::from_env(&full).unwrap();
        assert_eq!(creds.access_key_id, "AKIA1234");
        assert_eq!(creds.session_token.as_deref(), Some("token"));
    }

    #[test]
    fn incomplete_stored_object_is_absent() {
        let stored = StoredCredentials {
            access_key_id: Some("AKIA1234".into()),
            secret_access_key: None,
            session_token: Some("token".into()),
        };
        assert!(AwsCredentials::from_stored(&stored).is_none());
    }

    #[test]
    fn child_env_omits_missing_token() {
        let creds = AwsCredentials::from_parts(Some("a".into()), Some("b".into()), None).unwrap();
        let vars = creds.child_env();
        assert_eq!(vars.len(), 2);
        assert!(vars.iter().all(|(k, _)| *k != "AWS_SESSION_TOKEN"));
    }

    #[test]
    fn masks_access_key() {
        let creds =
            AwsCredentials::from_parts(Some("AKIAABCDWXYZ".into()), Some("s".into()), None).unwrap();
        assert_eq!(creds.masked_access_key(), "****WXYZ");
    }
}
