//! Subprocess runner for the AWS CLI and other JSON-emitting tools

use serde::de::DeserializeOwned;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::credentials::AwsCredentials;
use crate::config::{EffectiveConfig, EnvLookup};
use crate::error::CommandError;

pub const PRIMARY_TIMEOUT: Duration = Duration::from_secs(30);
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(20);
pub const SECONDARY_TIMEOUT: Duration = Duration::from_secs(15);

/// Run `program args...`, wait at most `timeout` and parse stdout as JSON
pub async fn run_command<T: DeserializeOwned>(
    program: &str,
    args: &[String],
    env: &[(&str, String)],
    env_remove: &[&str],
    timeout: Duration,
) -> Result<T, CommandError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in env {
        cmd.env(key, value);
    }
    for key in env_remove {
        cmd.env_remove(key);
    }

    debug!("Running {} {}", program, args.join(" "));

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result.map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(CommandError::Timeout {
                program: program.to_string(),
                secs: timeout.as_secs(),
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(CommandError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr,
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|source| CommandError::InvalidJson {
        program: program.to_string(),
        source,
    })
}

/// AWS CLI bound to one region and one credential unit
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    region: String,
    credentials: Option<AwsCredentials>,
}

impl AwsCli {
    pub fn new(config: &EffectiveConfig, env: &dyn EnvLookup) -> Self {
        Self {
            program: env
                .get("AWS_INSIGHTS_AWS_BIN")
                .unwrap_or_else(|| "aws".to_string()),
            region: config.region.clone(),
            credentials: config.credentials.clone(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Same identity, different region
    pub fn with_region(&self, region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..self.clone()
        }
    }

    /// Run `aws <args> --output json --region <region>`
    pub async fn json<T: DeserializeOwned>(
        &self,
        args: &[&str],
        timeout: Duration,
    ) -> Result<T, CommandError> {
        let mut full: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        full.extend([
            "--output".to_string(),
            "json".to_string(),
            "--region".to_string(),
            self.region.clone(),
        ]);

        let env = self
            .credentials
            .as_ref()
            .map(AwsCredentials::child_env)
            .unwrap_or_default();

        // Static credentials must win over any profile the user has selected
        let remove: &[&str] = if self.credentials.is_some() {
            &["AWS_PROFILE"]
        } else {
            &[]
        };

        run_command(&self.program, &full, &env, remove, timeout).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn parses_json_stdout() {
        let value: Value = run_command("sh", &sh(r#"echo '{"a": 1}'"#), &[], &[], PRIMARY_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(value["a"], 1);
    }

    #[tokio::test]
    async fn passes_environment_to_child() {
        let env = [("AWS_INSIGHTS_TEST_VAR", "hello".to_string())];
        let value: Value = run_command(
            "sh",
            &sh(r#"printf '{"v":"%s"}' "$AWS_INSIGHTS_TEST_VAR""#),
            &env,
            &[],
            PRIMARY_TIMEOUT,
        )
        .await
        .unwrap();
        assert_eq!(value["v"], "hello");
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let err = run_command::<Value>("sh", &sh("echo denied >&2; exit 3"), &[], &[], PRIMARY_TIMEOUT)
            .await
            .unwrap_err();
        match err {
            CommandError::Failed { stderr, .. } => assert_eq!(stderr, "denied"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_reported() {
        let err = run_command::<Value>("sh", &sh("echo not-json"), &[], &[], PRIMARY_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidJson { .. }));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = run_command::<Value>(
            "sh",
            &sh("sleep 5"),
            &[],
            &[],
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = run_command::<Value>(
            "aws-insights-definitely-not-installed",
            &[],
            &[],
            &[],
            PRIMARY_TIMEOUT,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
