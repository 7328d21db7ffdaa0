//! Local ledger of completion usage and cost
//!
//! The whole file is read and rewritten on every append. There is no locking,
//! so two concurrent invocations can lose one of their records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{write_private, EffectiveConfig};

/// Per-million-token rates in USD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub cached_per_million: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_million: 0.40,
            output_per_million: 1.60,
            cached_per_million: 0.10,
        }
    }
}

impl Pricing {
    /// Configured rates, falling back to the defaults per token type
    pub fn from_config(config: &EffectiveConfig) -> Self {
        let defaults = Self::default();
        Self {
            input_per_million: config.input_cost.unwrap_or(defaults.input_per_million),
            output_per_million: config.output_cost.unwrap_or(defaults.output_per_million),
            cached_per_million: config.cached_cost.unwrap_or(defaults.cached_per_million),
        }
    }

    /// Cached tokens are billed at their own rate, not as regular input
    pub fn cost(&self, input_tokens: u64, output_tokens: u64, cached_tokens: u64) -> f64 {
        let uncached = input_tokens.saturating_sub(cached_tokens) as f64;
        uncached / 1e6 * self.input_per_million
            + output_tokens as f64 / 1e6 * self.output_per_million
            + cached_tokens as f64 / 1e6 * self.cached_per_million
    }
}

/// One completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cached_tokens: u64,
    pub total_tokens: u64,
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Usage reported for a job about to be recorded
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub name: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    /// Provider-reported cost; computed from [`Pricing`] when absent
    pub cost: Option<f64>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelUsage {
    pub jobs: usize,
    pub total_tokens: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageSummary {
    pub jobs: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    pub total_tokens: u64,
    pub cost: f64,
    pub by_model: BTreeMap<String, ModelUsage>,
}

impl UsageSummary {
    pub fn from_records(records: &[JobRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.jobs += 1;
            summary.input_tokens += record.input_tokens;
            summary.output_tokens += record.output_tokens;
            summary.cached_tokens += record.cached_tokens;
            summary.total_tokens += record.total_tokens;
            summary.cost += record.cost;

            let model = record.model.clone().unwrap_or_else(|| "unknown".to_string());
            let entry = summary.by_model.entry(model).or_default();
            entry.jobs += 1;
            entry.total_tokens += record.total_tokens;
            entry.cost += record.cost;
        }
        summary
    }
}

/// Append-only job ledger backed by a JSON array file
#[derive(Debug, Clone)]
pub struct JobLedger {
    path: PathBuf,
    pricing: Pricing,
}

impl JobLedger {
    pub fn new(path: impl Into<PathBuf>, pricing: Pricing) -> Self {
        Self {
            path: path.into(),
            pricing,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt ledgers read as empty
    pub fn read_all(&self) -> Vec<JobRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No job ledger at {:?}: {}", self.path, e);
                return Vec::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring corrupt job ledger {:?}: {}", self.path, e);
            Vec::new()
        })
    }

    /// Record a job and return its id; write failures are logged and ignored
    pub fn append(&self, job: NewJob) -> String {
        let id = format!("{:016x}", rand::random::<u64>());
        let cost = job.cost.unwrap_or_else(|| {
            self.pricing
                .cost(job.input_tokens, job.output_tokens, job.cached_tokens)
        });

        let record = JobRecord {
            id: id.clone(),
            name: job.name,
            timestamp: Utc::now(),
            input_tokens: job.input_tokens,
            output_tokens: job.output_tokens,
            cached_tokens: job.cached_tokens,
            total_tokens: job.input_tokens + job.output_tokens,
            cost,
            model: job.model,
        };

        let mut records = self.read_all();
        records.push(record);

        let written = serde_json::to_string_pretty(&records)
            .map_err(|e| e.to_string())
            .and_then(|content| write_private(&self.path, &content).map_err(|e| e.to_string()));
        match written {
            Ok(()) => debug!("Recorded job {} in {:?}", id, self.path),
            Err(e) => warn!("Could not record job {}: {}", id, e),
        }

        id
    }

    pub fn summary(&self) -> UsageSummary {
        UsageSummary::from_records(&self.read_all())
    }
}
