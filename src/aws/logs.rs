//! CloudWatch Logs collector (`aws logs describe-log-groups`)

use serde::{Deserialize, Serialize};

use super::cli::{AwsCli, LISTING_TIMEOUT};
use super::{lenient, summarize, Reported};
use crate::error::CommandError;

const TOP_GROUPS: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeLogGroupsResponse {
    #[serde(default)]
    pub log_groups: Vec<RawLogGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogGroup {
    #[serde(default)]
    pub log_group_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub retention_in_days: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub stored_bytes: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct LogsSummary {
    pub group_count: usize,
    pub total_stored_bytes: u64,
    pub groups_without_retention: usize,
    pub largest_groups: Vec<LogGroupSummary>,
}

#[derive(Debug, Serialize)]
pub struct LogGroupSummary {
    pub name: String,
    /// Unknown means the group never expires
    pub retention_days: Reported<u32>,
    pub stored_bytes: Reported<u64>,
}

pub async fn collect(aws: &AwsCli) -> String {
    summarize("CloudWatch Logs", gather(aws).await)
}

async fn gather(aws: &AwsCli) -> Result<LogsSummary, CommandError> {
    let response: DescribeLogGroupsResponse = aws
        .json(&["logs", "describe-log-groups"], LISTING_TIMEOUT)
        .await?;
    Ok(project(response))
}

pub fn project(response: DescribeLogGroupsResponse) -> LogsSummary {
    let group_count = response.log_groups.len();
    let total_stored_bytes: u64 = response
        .log_groups
        .iter()
        .filter_map(|g| g.stored_bytes)
        .sum();
    let groups_without_retention = response
        .log_groups
        .iter()
        .filter(|g| g.retention_in_days.is_none())
        .count();

    let mut groups = response.log_groups;
    groups.sort_by(|a, b| b.stored_bytes.unwrap_or(0).cmp(&a.stored_bytes.unwrap_or(0)));
    groups.truncate(TOP_GROUPS);

    LogsSummary {
        group_count,
        total_stored_bytes,
        groups_without_retention,
        largest_groups: groups
            .into_iter()
            .map(|g| LogGroupSummary {
                name: g.log_group_name,
                retention_days: g.retention_in_days.into(),
                stored_bytes: g.stored_bytes.into(),
            })
            .collect(),
    }
}
