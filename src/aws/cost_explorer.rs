//! Cost Explorer collector (`aws ce get-cost-and-usage`)

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::cli::{AwsCli, PRIMARY_TIMEOUT};
use super::summarize;
use crate::config::ScanPeriod;
use crate::error::CommandError;

/// Services kept in the projection
const TOP_SERVICES: usize = 10;

/// Time period for cost queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimePeriod {
    pub start: String,
    pub end: String,
}

impl TimePeriod {
    /// The `days` days ending today, with an exclusive end date of tomorrow
    pub fn ending_on(today: NaiveDate, days: u32) -> Self {
        let end = today + Duration::days(1);
        let start = end - Duration::days(i64::from(days));
        Self {
            start: start.format("%Y-%m-%d").to_string(),
            end: end.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Cost and usage response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCostAndUsageResponse {
    #[serde(default)]
    pub results_by_time: Vec<ResultByTime>,
}

/// Results grouped by time period
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultByTime {
    pub time_period: TimePeriodResponse,
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// Time period in response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimePeriodResponse {
    pub start: String,
}

/// Group in response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub metrics: HashMap<String, MetricValue>,
}

/// Metric value
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct MetricValue {
    pub amount: String,
    pub unit: Option<String>,
}

/// Cost summary sent to the model
#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub period: TimePeriod,
    pub granularity: &'static str,
    pub total_cost: f64,
    pub currency: String,
    pub top_services: Vec<ServiceCost>,
    pub service_count: usize,
    pub daily_totals: Vec<DailyCost>,
}

/// Cost breakdown by service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceCost {
    pub service: String,
    pub cost: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCost {
    pub date: String,
    pub cost: f64,
}

fn granularity(period: ScanPeriod) -> &'static str {
    if period.days() <= 30 {
        "DAILY"
    } else {
        "MONTHLY"
    }
}

pub async fn collect(aws: &AwsCli, period: ScanPeriod) -> String {
    summarize("cost", gather(aws, period).await)
}

async fn gather(aws: &AwsCli, period: ScanPeriod) -> Result<CostSummary, CommandError> {
    let time_period = TimePeriod::ending_on(Local::now().date_naive(), period.days());
    let range = format!("Start={},End={}", time_period.start, time_period.end);
    let granularity = granularity(period);

    let response: GetCostAndUsageResponse = aws
        .json(
            &[
                "ce",
                "get-cost-and-usage",
                "--time-period",
                &range,
                "--granularity",
                granularity,
                "--metrics",
                "UnblendedCost",
                "--group-by",
                "Type=DIMENSION,Key=SERVICE",
            ],
            PRIMARY_TIMEOUT,
        )
        .await?;

    Ok(project(&response, time_period, granularity))
}

/// Fold the per-period groups into service totals, largest first
pub fn project(
    response: &GetCostAndUsageResponse,
    period: TimePeriod,
    granularity: &'static str,
) -> CostSummary {
    let mut currency = "USD".to_string();
    let mut by_service: HashMap<String, f64> = HashMap::new();
    let mut by_day: BTreeMap<String, f64> = BTreeMap::new();

    for result in &response.results_by_time {
        let mut day_total = 0.0;
        for group in &result.groups {
            let service_name = group.keys.first().cloned().unwrap_or_default();
            if let Some(metric) = group.metrics.get("UnblendedCost") {
                let cost: f64 = metric.amount.parse().unwrap_or(0.0);
                if let Some(unit) = &metric.unit {
                    currency = unit.clone();
                }
                day_total += cost;
                *by_service.entry(service_name).or_default() += cost;
            }
        }
        by_day.insert(result.time_period.start.clone(), round_cents(day_total));
    }

    let mut services: Vec<ServiceCost> = by_service
        .into_iter()
        .filter(|(_, cost)| *cost > 0.001)
        .map(|(service, cost)| ServiceCost {
            service,
            cost,
            percentage: 0.0,
        })
        .collect();
    let total_cost: f64 = services.iter().map(|s| s.cost).sum();

    // Calculate percentages and sort by cost descending
    for service in &mut services {
        service.percentage = if total_cost > 0.0 {
            round_cents((service.cost / total_cost) * 100.0)
        } else {
            0.0
        };
        service.cost = round_cents(service.cost);
    }
    services.sort_by(|a, b| b.cost.partial_cmp(&a.cost).unwrap_or(std::cmp::Ordering::Equal));

    let service_count = services.len();
    services.truncate(TOP_SERVICES);

    let daily_totals = if granularity == "DAILY" {
        by_day
            .into_iter()
            .map(|(date, cost)| DailyCost { date, cost })
            .collect()
    } else {
        Vec::new()
    };

    CostSummary {
        period,
        granularity,
        total_cost: round_cents(total_cost),
        currency,
        top_services: services,
        service_count,
        daily_totals,
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
