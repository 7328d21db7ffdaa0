//! Trusted Advisor collector (AWS Support API, always `us-east-1`)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::cli::{AwsCli, PRIMARY_TIMEOUT, SECONDARY_TIMEOUT};
use super::{lenient, or_empty, summarize, Reported};
use crate::error::CommandError;

const SUPPORT_REGION: &str = "us-east-1";
const MAX_FLAGGED: usize = 30;

#[derive(Debug, Deserialize)]
pub struct ChecksResponse {
    #[serde(default)]
    pub checks: Vec<RawCheck>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCheck {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckSummariesResponse {
    #[serde(default)]
    pub summaries: Vec<RawCheckSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCheckSummary {
    pub check_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub resources_summary: Option<RawResourcesSummary>,
    #[serde(default, deserialize_with = "lenient")]
    pub category_specific_summary: Option<RawCategorySummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResourcesSummary {
    #[serde(default, deserialize_with = "lenient")]
    pub resources_flagged: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCategorySummary {
    #[serde(default, deserialize_with = "lenient")]
    pub cost_optimizing: Option<RawCostOptimizing>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCostOptimizing {
    #[serde(default, deserialize_with = "lenient")]
    pub estimated_monthly_savings: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AdvisorSummary {
    pub check_count: usize,
    pub checks_by_category: BTreeMap<String, usize>,
    pub results: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CheckResults {
    pub status_counts: BTreeMap<String, usize>,
    pub flagged: Vec<FlaggedCheck>,
}

#[derive(Debug, Serialize)]
pub struct FlaggedCheck {
    pub name: String,
    pub category: String,
    pub status: String,
    pub resources_flagged: Reported<u64>,
    pub estimated_monthly_savings: Reported<f64>,
}

pub async fn collect(aws: &AwsCli) -> String {
    summarize("Trusted Advisor", gather(aws).await)
}

async fn gather(aws: &AwsCli) -> Result<AdvisorSummary, CommandError> {
    let support = aws.with_region(SUPPORT_REGION);
    let checks: ChecksResponse = support
        .json(
            &["support", "describe-trusted-advisor-checks", "--language", "en"],
            PRIMARY_TIMEOUT,
        )
        .await?;

    let mut args = vec!["support", "describe-trusted-advisor-check-summaries", "--check-ids"];
    args.extend(checks.checks.iter().map(|c| c.id.as_str()));
    let summaries = if checks.checks.is_empty() {
        Ok(CheckSummariesResponse {
            summaries: Vec::new(),
        })
    } else {
        support
            .json::<CheckSummariesResponse>(&args, SECONDARY_TIMEOUT)
            .await
    };

    let results = summaries.map(|s| project_results(&checks.checks, s));
    Ok(AdvisorSummary {
        check_count: checks.checks.len(),
        checks_by_category: categories(&checks.checks),
        results: or_empty("Trusted Advisor check summaries", results),
    })
}

pub fn categories(checks: &[RawCheck]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for check in checks {
        *counts.entry(check.category.clone()).or_default() += 1;
    }
    counts
}

/// Status histogram plus the checks in warning or error state
pub fn project_results(checks: &[RawCheck], response: CheckSummariesResponse) -> CheckResults {
    let by_id: HashMap<&str, &RawCheck> = checks.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut flagged = Vec::new();

    for summary in response.summaries {
        let status = summary.status.unwrap_or_else(|| "unknown".to_string());
        *status_counts.entry(status.clone()).or_default() += 1;

        if status != "warning" && status != "error" {
            continue;
        }
        let (name, category) = match by_id.get(summary.check_id.as_str()) {
            Some(check) => (check.name.clone(), check.category.clone()),
            None => (summary.check_id.clone(), String::new()),
        };
        flagged.push(FlaggedCheck {
            name,
            category,
            status,
            resources_flagged: summary
                .resources_summary
                .and_then(|r| r.resources_flagged)
                .into(),
            estimated_monthly_savings: summary
                .category_specific_summary
                .and_then(|c| c.cost_optimizing)
                .and_then(|c| c.estimated_monthly_savings)
                .into(),
        });
    }

    // Errors first, then by number of flagged resources
    flagged.sort_by(|a, b| {
        (b.status == "error")
            .cmp(&(a.status == "error"))
            .then_with(|| flagged_count(b).cmp(&flagged_count(a)))
    });
    flagged.truncate(MAX_FLAGGED);

    CheckResults {
        status_counts,
        flagged,
    }
}

fn flagged_count(check: &FlaggedCheck) -> u64 {
    match check.resources_flagged {
        Reported::Value(n) => n,
        Reported::Unknown => 0,
    }
}
