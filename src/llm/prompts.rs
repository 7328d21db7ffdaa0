//! Prompt construction
//!
//! Every analyzer asks for the same four-row table. Only the headings and
//! the reviewer's focus change. The heading glyphs double as the row markers
//! the response parser looks for.

use crate::analyzer::Analyzer;
use crate::config::EffectiveConfig;

/// Headings for the four table rows, in order
pub fn sections(analyzer: Analyzer) -> [&'static str; 4] {
    match analyzer {
        Analyzer::Cost => [
            "📊 Cost Overview",
            "🔍 Top Cost Drivers",
            "⚠️ Anomalies & Risks",
            "💡 Savings Opportunities",
        ],
        Analyzer::Lambda => [
            "📊 Function Inventory",
            "🔍 Configuration Review",
            "⚠️ Runtime & Performance Risks",
            "💡 Optimization Recommendations",
        ],
        Analyzer::Logs => [
            "📊 Log Storage Overview",
            "🔍 Largest Log Groups",
            "⚠️ Retention Gaps",
            "💡 Cost Reduction Steps",
        ],
        Analyzer::Terraform => [
            "📊 Plan Overview",
            "🔍 Notable Changes",
            "⚠️ Destructive or Risky Changes",
            "💡 Review Recommendations",
        ],
        Analyzer::Iam => [
            "📊 Identity Overview",
            "🔍 User & Credential Review",
            "⚠️ Security Risks",
            "💡 Hardening Recommendations",
        ],
        Analyzer::Advisor => [
            "📊 Check Status Overview",
            "🔍 Flagged Checks",
            "⚠️ Critical Issues",
            "💡 Recommended Actions",
        ],
        Analyzer::Security => [
            "📊 Findings Overview",
            "🔍 Highest Severity Findings",
            "⚠️ Compliance Gaps",
            "💡 Remediation Plan",
        ],
    }
}

fn focus(analyzer: Analyzer) -> &'static str {
    match analyzer {
        Analyzer::Cost => "spending trends, the services driving cost and concrete ways to save money",
        Analyzer::Lambda => "memory and timeout sizing, deprecated runtimes and oversized deployment packages",
        Analyzer::Logs => "log groups that never expire, the largest stored volumes and retention policy",
        Analyzer::Terraform => "resources being destroyed or replaced, security-sensitive changes and blast radius",
        Analyzer::Iam => "MFA coverage, stale users, access keys and password policy strength",
        Analyzer::Advisor => "checks in error or warning state and the savings they point to",
        Analyzer::Security => "critical and high severity findings, failed controls and remediation order",
    }
}

pub fn system_prompt(analyzer: Analyzer) -> String {
    let rows: String = sections(analyzer)
        .iter()
        .map(|heading| format!("| {} | • item<br>• item |\n", heading))
        .collect();

    format!(
        "You are a senior AWS cloud engineer reviewing {surface} data. Focus on {focus}.\n\
         \n\
         Answer ONLY with a markdown table in exactly this format:\n\
         \n\
         | Section | Details |\n\
         |---|---|\n\
         {rows}\n\
         Rules:\n\
         - Use exactly these four rows, in this order, with these headings.\n\
         - Separate items inside a cell with <br> and start each item with \"• \".\n\
         - Never use the | character inside a cell.\n\
         - If a section has nothing to report, write N/A.\n\
         - Cite resource names, counts and dollar amounts from the data.\n\
         - If the data is an error message, explain the likely cause and how to fix it.",
        surface = analyzer.title(),
        focus = focus(analyzer),
        rows = rows,
    )
}

pub fn user_prompt(
    analyzer: Analyzer,
    data: &str,
    config: &EffectiveConfig,
    question: Option<&str>,
) -> String {
    let scope = match analyzer {
        Analyzer::Terraform => String::new(),
        _ => format!(
            " for region {} over the last {} days",
            config.region,
            config.scan_period.days()
        ),
    };

    let mut prompt = format!(
        "{} data{}:\n\n```json\n{}\n```\n",
        analyzer.title(),
        scope,
        data
    );
    if let Some(question) = question.map(str::trim).filter(|q| !q.is_empty()) {
        prompt.push_str(&format!(
            "\nAlso answer this question from the user within the table: {}\n",
            question
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::render::SECTION_MARKERS;

    #[test]
    fn every_heading_starts_with_a_marker() {
        for analyzer in Analyzer::ALL {
            for heading in sections(analyzer) {
                assert!(
                    SECTION_MARKERS.iter().any(|m| heading.starts_with(m)),
                    "{heading} has no marker"
                );
            }
        }
    }

    #[test]
    fn system_prompt_lists_rows() {
        let prompt = system_prompt(Analyzer::Iam);
        assert!(prompt.contains("| 📊 Identity Overview | • item<br>• item |"));
        assert!(prompt.contains("IAM"));
    }
}
