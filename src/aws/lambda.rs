//! Lambda collector (`aws lambda list-functions`)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cli::{AwsCli, LISTING_TIMEOUT};
use super::{lenient, summarize, Reported};
use crate::error::CommandError;

const TOP_FUNCTIONS: usize = 25;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListFunctionsResponse {
    #[serde(default)]
    pub functions: Vec<RawFunction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawFunction {
    #[serde(default)]
    pub function_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub runtime: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub memory_size: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub timeout: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub code_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_modified: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LambdaSummary {
    pub function_count: usize,
    pub runtimes: BTreeMap<String, usize>,
    pub functions: Vec<FunctionSummary>,
}

#[derive(Debug, Serialize)]
pub struct FunctionSummary {
    pub name: String,
    pub runtime: Reported<String>,
    pub memory_mb: Reported<u32>,
    pub timeout_secs: Reported<u32>,
    pub code_size_bytes: Reported<u64>,
    pub last_modified: Reported<String>,
}

pub async fn collect(aws: &AwsCli) -> String {
    summarize("Lambda", gather(aws).await)
}

async fn gather(aws: &AwsCli) -> Result<LambdaSummary, CommandError> {
    let response: ListFunctionsResponse = aws
        .json(&["lambda", "list-functions"], LISTING_TIMEOUT)
        .await?;
    Ok(project(response))
}

/// Runtime histogram plus the largest functions by code size
pub fn project(response: ListFunctionsResponse) -> LambdaSummary {
    let mut runtimes: BTreeMap<String, usize> = BTreeMap::new();
    for function in &response.functions {
        let runtime = function
            .runtime
            .clone()
            .unwrap_or_else(|| "container-image".to_string());
        *runtimes.entry(runtime).or_default() += 1;
    }

    let function_count = response.functions.len();
    let mut functions = response.functions;
    functions.sort_by(|a, b| b.code_size.unwrap_or(0).cmp(&a.code_size.unwrap_or(0)));
    functions.truncate(TOP_FUNCTIONS);

    LambdaSummary {
        function_count,
        runtimes,
        functions: functions
            .into_iter()
            .map(|f| FunctionSummary {
                name: f.function_name,
                runtime: f.runtime.into(),
                memory_mb: f.memory_size.into(),
                timeout_secs: f.timeout.into(),
                code_size_bytes: f.code_size.into(),
                last_modified: f.last_modified.into(),
            })
            .collect(),
    }
}
