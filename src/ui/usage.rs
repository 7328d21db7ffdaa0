//! Plain-text report of the job ledger

use crossterm::style::Stylize;

use crate::ledger::{JobRecord, UsageSummary};

/// Jobs listed individually before the totals
const RECENT_JOBS: usize = 20;

pub fn render_usage(records: &[JobRecord], summary: &UsageSummary) -> String {
    let mut out = String::new();
    out.push_str("📒 aws-insights usage\n\n");

    if records.is_empty() {
        out.push_str("No jobs recorded yet.\n");
        return out;
    }

    out.push_str(&format!(
        "{:<18} {:<10} {:<20} {:>10} {:>10}  {}\n",
        "ID", "Job", "When", "Tokens", "Cost", "Model"
    ));
    out.push_str(&format!("{}\n", "─".repeat(86)));

    let skip = records.len().saturating_sub(RECENT_JOBS);
    for record in &records[skip..] {
        out.push_str(&format!(
            "{:<18} {:<10} {:<20} {:>10} {:>10.4}  {}\n",
            record.id,
            record.name,
            record.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            record.total_tokens,
            record.cost,
            truncate(record.model.as_deref().unwrap_or("unknown"), 24),
        ));
    }
    if skip > 0 {
        out.push_str(&format!("{}\n", format!("… {} older jobs not shown", skip).dark_grey()));
    }

    out.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    out.push_str(&format!(
        "💰 Total: ${:.4} across {} jobs\n",
        summary.cost, summary.jobs
    ));
    out.push_str(&format!(
        "🔢 Tokens: {} ({} in, {} out, {} cached)\n",
        summary.total_tokens, summary.input_tokens, summary.output_tokens, summary.cached_tokens
    ));

    if summary.by_model.len() > 1 {
        out.push_str("\n📋 By model:\n");
        for (model, usage) in &summary.by_model {
            out.push_str(&format!(
                "  {:<30} {:>5} jobs {:>10} tokens  ${:.4}\n",
                truncate(model, 28),
                usage.jobs,
                usage.total_tokens,
                usage.cost
            ));
        }
    }

    out
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}
