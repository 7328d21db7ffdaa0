//! IAM collector
//!
//! The account summary is the primary call. User listing and password policy
//! are secondary: if either fails that part of the summary is an empty object.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::cli::{AwsCli, PRIMARY_TIMEOUT, SECONDARY_TIMEOUT};
use super::{lenient, or_empty, summarize, Reported};
use crate::error::CommandError;

const MAX_USERS: usize = 50;

/// Counters from the account summary worth showing to the model
const SUMMARY_KEYS: [&str; 9] = [
    "Users",
    "Groups",
    "Roles",
    "Policies",
    "MFADevices",
    "MFADevicesInUse",
    "AccountMFAEnabled",
    "AccountAccessKeysPresent",
    "AccessKeysPerUserQuota",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountSummaryResponse {
    #[serde(default)]
    pub summary_map: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListUsersResponse {
    #[serde(default)]
    pub users: Vec<RawUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawUser {
    #[serde(default)]
    pub user_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub create_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub password_last_used: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PasswordPolicyResponse {
    #[serde(default)]
    pub password_policy: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct IamSummary {
    pub account: BTreeMap<String, Reported<i64>>,
    pub users: serde_json::Value,
    pub password_policy: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub name: String,
    pub created: Reported<String>,
    pub password_last_used: Reported<String>,
}

pub async fn collect(aws: &AwsCli) -> String {
    summarize("IAM", gather(aws).await)
}

async fn gather(aws: &AwsCli) -> Result<IamSummary, CommandError> {
    let summary: AccountSummaryResponse = aws
        .json(&["iam", "get-account-summary"], PRIMARY_TIMEOUT)
        .await?;

    let users = aws
        .json::<ListUsersResponse>(&["iam", "list-users"], SECONDARY_TIMEOUT)
        .await
        .map(project_users);
    let policy = aws
        .json::<PasswordPolicyResponse>(&["iam", "get-account-password-policy"], SECONDARY_TIMEOUT)
        .await
        .map(|r| r.password_policy);

    Ok(IamSummary {
        account: project_account(&summary),
        users: or_empty("IAM users", users),
        password_policy: or_empty("password policy", policy),
    })
}

pub fn project_account(response: &AccountSummaryResponse) -> BTreeMap<String, Reported<i64>> {
    SUMMARY_KEYS
        .iter()
        .map(|key| {
            let value = response.summary_map.get(*key).and_then(|v| v.as_i64());
            (key.to_string(), value.into())
        })
        .collect()
}

pub fn project_users(response: ListUsersResponse) -> Vec<UserSummary> {
    response
        .users
        .into_iter()
        .take(MAX_USERS)
        .map(|u| UserSummary {
            name: u.user_name,
            created: u.create_date.into(),
            password_last_used: u.password_last_used.into(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn account_counters_fill_unknowns() {
        let response: AccountSummaryResponse = serde_json::from_value(json!({
            "SummaryMap": { "Users": 4, "AccountMFAEnabled": 0, "Roles": "n/a" }
        }))
        .unwrap();

        let account = project_account(&response);
        assert_eq!(account["Users"], Reported::Value(4));
        assert_eq!(account["AccountMFAEnabled"], Reported::Value(0));
        assert_eq!(account["Roles"], Reported::Unknown);
        assert_eq!(account["Groups"], Reported::Unknown);
        assert_eq!(account.len(), SUMMARY_KEYS.len());
    }

    #[test]
    fn account_counters_serialize_in_stable_order() {
        let response: AccountSummaryResponse =
            serde_json::from_value(json!({ "SummaryMap": { "Users": 4, "Groups": 1 } })).unwrap();
        let text = serde_json::to_string(&project_account(&response)).unwrap();

        let mut sorted = SUMMARY_KEYS.to_vec();
        sorted.sort_unstable();
        let positions: Vec<usize> = sorted
            .iter()
            .map(|k| text.find(&format!("\"{}\"", k)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn users_without_console_login() {
        let response: ListUsersResponse = serde_json::from_value(json!({
            "Users": [
                { "UserName": "ci", "CreateDate": "2024-01-01T00:00:00Z" },
                { "UserName": "alice", "CreateDate": "2023-05-01T00:00:00Z", "PasswordLastUsed": "2026-10-01T00:00:00Z" }
            ]
        }))
        .unwrap();

        let users = serde_json::to_value(project_users(response)).unwrap();
        assert_eq!(users[0]["password_last_used"], "unknown");
        assert_eq!(users[1]["name"], "alice");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn secondary_failures_leave_empty_objects() {
        let dir = tempfile::TempDir::new().unwrap();
        let aws = crate::aws::fake::cli(
            dir.path(),
            "eu-west-1",
            r#"case "$2" in
  get-account-summary) echo '{"SummaryMap": {"Users": 3, "AccountMFAEnabled": 1}}' ;;
  *) echo "AccessDenied" >&2; exit 254 ;;
esac"#,
        );

        let text = collect(&aws).await;
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["account"]["Users"], 3);
        assert_eq!(value["account"]["Groups"], "unknown");
        assert_eq!(value["users"], json!({}));
        assert_eq!(value["password_policy"], json!({}));

        let argv = crate::aws::fake::argv_log(dir.path());
        assert!(argv.contains("iam get-account-summary --output json --region eu-west-1"));
        assert!(argv.contains("iam list-users"));
        assert!(argv.contains("iam get-account-password-policy"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn primary_failure_becomes_error_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let aws = crate::aws::fake::cli(dir.path(), "eu-west-1", r#"echo "AccessDenied" >&2; exit 254"#);

        let text = collect(&aws).await;
        assert!(text.starts_with("Error collecting IAM data:"));
        assert!(text.contains("AccessDenied"));
        assert_eq!(crate::aws::fake::argv_log(dir.path()).lines().count(), 1);
    }
}
