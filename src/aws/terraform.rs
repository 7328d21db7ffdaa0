//! Terraform plan collector
//!
//! Works without AWS access: a JSON plan is read directly, a binary plan is
//! converted with `terraform show -json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::cli::{run_command, PRIMARY_TIMEOUT};
use super::{lenient, summarize, Reported};
use crate::error::CommandError;

const MAX_CHANGES: usize = 50;

#[derive(Debug, Deserialize)]
pub struct RawPlan {
    #[serde(default, deserialize_with = "lenient")]
    pub terraform_version: Option<String>,
    #[serde(default)]
    pub resource_changes: Vec<RawResourceChange>,
}

#[derive(Debug, Deserialize)]
pub struct RawResourceChange {
    #[serde(default)]
    pub address: String,
    #[serde(default, rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub change: RawChange,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawChange {
    #[serde(default)]
    pub actions: Vec<String>,
}

/// What a resource change does, with create+delete pairs folded into replace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanAction {
    Create,
    Update,
    Delete,
    Replace,
    Read,
    NoOp,
}

impl PlanAction {
    fn from_actions(actions: &[String]) -> Self {
        let has = |name: &str| actions.iter().any(|a| a == name);
        match (has("create"), has("delete")) {
            (true, true) => PlanAction::Replace,
            (true, false) => PlanAction::Create,
            (false, true) => PlanAction::Delete,
            _ if has("update") => PlanAction::Update,
            _ if has("read") => PlanAction::Read,
            _ => PlanAction::NoOp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanSummary {
    pub terraform_version: Reported<String>,
    pub action_counts: BTreeMap<PlanAction, usize>,
    pub changes: Vec<ChangeSummary>,
}

#[derive(Debug, Serialize)]
pub struct ChangeSummary {
    pub address: String,
    pub resource_type: String,
    pub action: PlanAction,
}

pub async fn collect(plan: &Path) -> String {
    summarize("Terraform plan", gather(plan).await)
}

async fn gather(plan: &Path) -> Result<PlanSummary, CommandError> {
    let is_json = plan
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let raw: RawPlan = if is_json {
        let content = tokio::fs::read_to_string(plan)
            .await
            .map_err(|source| CommandError::Read {
                path: plan.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| CommandError::InvalidJson {
            program: plan.display().to_string(),
            source,
        })?
    } else {
        let args = vec![
            "show".to_string(),
            "-json".to_string(),
            plan.display().to_string(),
        ];
        run_command("terraform", &args, &[], &[], PRIMARY_TIMEOUT).await?
    };

    Ok(project(raw))
}

pub fn project(plan: RawPlan) -> PlanSummary {
    let mut action_counts: BTreeMap<PlanAction, usize> = BTreeMap::new();
    let mut changes = Vec::new();

    for change in plan.resource_changes {
        let action = PlanAction::from_actions(&change.change.actions);
        *action_counts.entry(action).or_default() += 1;
        if action != PlanAction::NoOp && changes.len() < MAX_CHANGES {
            changes.push(ChangeSummary {
                address: change.address,
                resource_type: change.resource_type,
                action,
            });
        }
    }

    PlanSummary {
        terraform_version: plan.terraform_version.into(),
        action_counts,
        changes,
    }
}
