//! Parsing and coloring of the model's table answer

use crossterm::style::{Color, Stylize};

/// Glyphs that mark a table row as a section
pub const SECTION_MARKERS: [&str; 4] = ["📊", "🔍", "⚠", "💡"];

const PLACEHOLDERS: [&str; 6] = ["n/a", "na", "none", "-", "nothing to report", "no data"];

/// One section of the answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    /// At least one marker row was found; sections with only placeholder
    /// details are already dropped
    Sections(Vec<Section>),
    /// No line looked like a section row
    Unparsed,
}

pub fn parse(text: &str) -> ParsedResponse {
    let mut matched = false;
    let mut sections = Vec::new();

    for line in text.lines() {
        if let Some(section) = parse_row(line) {
            matched = true;
            if !section.items.is_empty() {
                sections.push(section);
            }
        }
    }

    if matched {
        ParsedResponse::Sections(sections)
    } else {
        ParsedResponse::Unparsed
    }
}

fn parse_row(line: &str) -> Option<Section> {
    if !line.contains('|') || !SECTION_MARKERS.iter().any(|m| line.contains(m)) {
        return None;
    }

    let cells: Vec<&str> = line
        .trim()
        .trim_matches('|')
        .split('|')
        .map(str::trim)
        .collect();

    let heading = cells.first().filter(|h| !h.is_empty())?;
    let details = cells.get(1).copied().unwrap_or_default();

    let items = details
        .replace("<br/>", "<br>")
        .replace("<br />", "<br>")
        .split("<br>")
        .map(|item| strip_bullet(item.trim()).to_string())
        .filter(|item| !is_placeholder(item))
        .collect();

    Some(Section {
        heading: heading.to_string(),
        items,
    })
}

/// Drop one leading list marker; a bare `-12%` keeps its sign
fn strip_bullet(item: &str) -> &str {
    ["• ", "- ", "* "]
        .iter()
        .find_map(|bullet| item.strip_prefix(bullet))
        .map(str::trim)
        .unwrap_or(item)
}

fn is_placeholder(item: &str) -> bool {
    let normalized = item.trim_end_matches('.').to_lowercase();
    normalized.is_empty() || PLACEHOLDERS.contains(&normalized.as_str())
}

fn accent(heading: &str) -> Color {
    if heading.contains('⚠') {
        Color::Yellow
    } else if heading.contains('💡') {
        Color::Green
    } else if heading.contains('🔍') {
        Color::Magenta
    } else {
        Color::Cyan
    }
}

/// Colored console text; unparsed answers render as nothing
pub fn render(parsed: &ParsedResponse) -> String {
    let sections = match parsed {
        ParsedResponse::Sections(sections) => sections,
        ParsedResponse::Unparsed => return String::new(),
    };

    let mut out = String::new();
    for section in sections {
        let color = accent(&section.heading);
        out.push_str(&format!("\n{}\n", section.heading.as_str().bold().with(color)));
        for item in &section.items {
            out.push_str(&format!("  {} {}\n", "•".with(color), item));
        }
    }
    out
}

/// Dimmed one-line usage note printed after an answer
pub fn usage_footer(job_id: &str, model: &str, input: u64, output: u64, cached: u64) -> String {
    let text = format!(
        "job {} · {} · {} in / {} out / {} cached tokens",
        job_id, model, input, output, cached
    );
    format!("{}", text.dark_grey())
}
