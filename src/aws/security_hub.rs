//! Security Hub collector
//!
//! Active findings are the primary call. The enabled standards act as the
//! compliance summary and degrade to an empty object when unavailable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cli::{AwsCli, PRIMARY_TIMEOUT, SECONDARY_TIMEOUT};
use super::{lenient, or_empty, summarize, Reported};
use crate::error::CommandError;

const MAX_FINDINGS: &str = "50";
const ACTIVE_FILTER: &str = r#"{"RecordState":[{"Value":"ACTIVE","Comparison":"EQUALS"}],"WorkflowStatus":[{"Value":"RESOLVED","Comparison":"NOT_EQUALS"}]}"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FindingsResponse {
    #[serde(default)]
    pub findings: Vec<RawFinding>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawFinding {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub severity: Option<RawSeverity>,
    #[serde(default, deserialize_with = "lenient")]
    pub resources: Option<Vec<RawResource>>,
    #[serde(default, deserialize_with = "lenient")]
    pub compliance: Option<RawCompliance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawSeverity {
    #[serde(default, deserialize_with = "lenient")]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawResource {
    #[serde(default, rename = "Type")]
    pub resource_type: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawCompliance {
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnabledStandardsResponse {
    #[serde(default)]
    pub standards_subscriptions: Vec<RawStandard>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawStandard {
    #[serde(default)]
    pub standards_arn: String,
    #[serde(default)]
    pub standards_status: String,
}

#[derive(Debug, Serialize)]
pub struct SecuritySummary {
    pub finding_count: usize,
    pub severity_counts: BTreeMap<String, usize>,
    pub findings: Vec<FindingSummary>,
    pub compliance: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct FindingSummary {
    pub title: String,
    pub severity: Reported<String>,
    pub resource_type: Reported<String>,
    pub resource_id: Reported<String>,
    pub compliance_status: Reported<String>,
}

pub async fn collect(aws: &AwsCli) -> String {
    summarize("Security Hub", gather(aws).await)
}

async fn gather(aws: &AwsCli) -> Result<SecuritySummary, CommandError> {
    let findings: FindingsResponse = aws
        .json(
            &[
                "securityhub",
                "get-findings",
                "--filters",
                ACTIVE_FILTER,
                "--max-items",
                MAX_FINDINGS,
            ],
            PRIMARY_TIMEOUT,
        )
        .await?;

    let standards = aws
        .json::<EnabledStandardsResponse>(&["securityhub", "get-enabled-standards"], SECONDARY_TIMEOUT)
        .await
        .map(|r| r.standards_subscriptions);

    let mut summary = project(findings);
    summary.compliance = or_empty("enabled standards", standards);
    Ok(summary)
}

/// Findings ordered by severity with a per-severity histogram
pub fn project(response: FindingsResponse) -> SecuritySummary {
    let mut severity_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut findings: Vec<FindingSummary> = response
        .findings
        .into_iter()
        .map(|f| {
            let severity = f.severity.and_then(|s| s.label);
            let label = severity.clone().unwrap_or_else(|| "UNKNOWN".to_string());
            *severity_counts.entry(label).or_default() += 1;

            let resource = f.resources.and_then(|r| r.into_iter().next());
            FindingSummary {
                title: f.title,
                severity: severity.into(),
                resource_type: resource.as_ref().map(|r| r.resource_type.clone()).into(),
                resource_id: resource.map(|r| r.id).into(),
                compliance_status: f.compliance.and_then(|c| c.status).into(),
            }
        })
        .collect();

    findings.sort_by_key(|f| severity_rank(&f.severity));

    SecuritySummary {
        finding_count: findings.len(),
        severity_counts,
        findings,
        compliance: serde_json::Value::Object(Default::default()),
    }
}

fn severity_rank(severity: &Reported<String>) -> u8 {
    match severity {
        Reported::Value(label) => match label.as_str() {
            "CRITICAL" => 0,
            "HIGH" => 1,
            "MEDIUM" => 2,
            "LOW" => 3,
            _ => 4,
        },
        Reported::Unknown => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn orders_by_severity() {
        let response: FindingsResponse = serde_json::from_value(json!({
            "Findings": [
                { "Title": "Low thing", "Severity": { "Label": "LOW" } },
                {
                    "Title": "Open SSH",
                    "Severity": { "Label": "CRITICAL" },
                    "Resources": [{ "Type": "AwsEc2SecurityGroup", "Id": "sg-123" }],
                    "Compliance": { "Status": "FAILED" }
                },
                { "Title": "Mystery", "Severity": "broken" }
            ]
        }))
        .unwrap();

        let summary = project(response);
        assert_eq!(summary.finding_count, 3);
        assert_eq!(summary.findings[0].title, "Open SSH");
        assert_eq!(summary.findings[2].severity, Reported::Unknown);
        assert_eq!(summary.severity_counts["UNKNOWN"], 1);

        let first = serde_json::to_value(&summary.findings[0]).unwrap();
        assert_eq!(first["resource_type"], "AwsEc2SecurityGroup");
        assert_eq!(first["compliance_status"], "FAILED");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn findings_survive_missing_standards() {
        let dir = tempfile::TempDir::new().unwrap();
        let aws = crate::aws::fake::cli(
            dir.path(),
            "ap-southeast-2",
            r#"case "$2" in
  get-findings) echo '{"Findings": [{"Title": "Open security group", "Severity": {"Label": "HIGH"}}]}' ;;
  *) echo "InvalidAccessException" >&2; exit 254 ;;
esac"#,
        );

        let text = collect(&aws).await;
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["finding_count"], 1);
        assert_eq!(value["findings"][0]["title"], "Open security group");
        assert_eq!(value["severity_counts"]["HIGH"], 1);
        assert_eq!(value["compliance"], json!({}));

        let argv = crate::aws::fake::argv_log(dir.path());
        assert!(argv.contains("--max-items 50 --output json --region ap-southeast-2"));
        assert!(argv.contains("securityhub get-enabled-standards"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn findings_failure_becomes_error_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let aws = crate::aws::fake::cli(dir.path(), "us-west-2", "echo 'not subscribed' >&2; exit 1");

        let text = collect(&aws).await;
        assert!(text.starts_with("Error collecting Security Hub data:"));
        assert!(text.contains("not subscribed"));
    }
}
