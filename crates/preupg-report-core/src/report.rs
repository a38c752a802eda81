use std::fmt::{self, Write};

use serde::Serialize;
use tracing::error;

/// Result keywords a rule-result may carry, ordered from most to least severe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Error,
    Fail,
    NeedsAction,
    NeedsInspection,
    Fixed,
    Informational,
    Pass,
    NotApplicable,
    NotChecked,
    /// Any keyword outside the taxonomy, kept verbatim.
    Unrecognized(String),
}

impl ResultCode {
    pub fn parse(keyword: &str) -> Self {
        match keyword {
            "error" => Self::Error,
            "fail" => Self::Fail,
            "needs_action" => Self::NeedsAction,
            "needs_inspection" => Self::NeedsInspection,
            "fixed" => Self::Fixed,
            "informational" => Self::Informational,
            "pass" => Self::Pass,
            "notapplicable" => Self::NotApplicable,
            "notchecked" => Self::NotChecked,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Error => "error",
            Self::Fail => "fail",
            Self::NeedsAction => "needs_action",
            Self::NeedsInspection => "needs_inspection",
            Self::Fixed => "fixed",
            Self::Informational => "informational",
            Self::Pass => "pass",
            Self::NotApplicable => "notapplicable",
            Self::NotChecked => "notchecked",
            Self::Unrecognized(keyword) => keyword,
        }
    }

    /// Two-digit sort key: `01` is the most severe, `99` marks unknown keywords.
    pub fn priority(&self) -> &'static str {
        match self {
            Self::Error => "01",
            Self::Fail => "02",
            Self::NeedsAction => "03",
            Self::NeedsInspection => "04",
            Self::Fixed => "05",
            Self::Informational => "06",
            Self::Pass => "07",
            Self::NotApplicable => "08",
            Self::NotChecked => "09",
            Self::Unrecognized(_) => "99",
        }
    }
}

impl Serialize for ResultCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `<title>:<rule_id>:<result>` line as reported for an executed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultRecord<'a> {
    pub title: &'a str,
    pub rule_id: &'a str,
    pub result: &'a str,
}

impl<'a> ResultRecord<'a> {
    /// Split a raw line into exactly three colon-separated fields.
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut fields = line.split(':');
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(title), Some(rule_id), Some(result), None) => Some(Self {
                title,
                rule_id,
                result,
            }),
            _ => None,
        }
    }

    pub fn code(&self) -> ResultCode {
        ResultCode::parse(self.result)
    }
}

/// Sort key of a raw result line; malformed lines sort as `99`.
pub fn priority(line: &str) -> &'static str {
    ResultRecord::parse(line)
        .map(|record| record.code().priority())
        .unwrap_or("99")
}

/// Format styles supported when rendering result lines.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Render result lines in the requested format.
pub fn render_results<S: AsRef<str>>(
    lines: &[S],
    heading: &str,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => Ok(format_rules_to_table(lines, heading)?),
        OutputFormat::Json => {
            let rows: Vec<JsonRow<'_>> = sorted_by_priority(lines)
                .into_iter()
                .filter_map(|line| ResultRecord::parse(line).map(JsonRow::from))
                .collect();
            Ok(serde_json::to_string_pretty(&rows)?)
        }
    }
}

/// Render result lines as an aligned table, least severe results first.
///
/// Returns an empty string for empty input. Lines that do not split into
/// three fields are logged as errors and left out of the table.
pub fn format_rules_to_table<S: AsRef<str>>(lines: &[S], heading: &str) -> Result<String, fmt::Error> {
    let mut out = String::new();
    if lines.is_empty() {
        return Ok(out);
    }
    let records: Vec<_> = lines
        .iter()
        .filter_map(|line| ResultRecord::parse(line.as_ref()))
        .collect();
    let title_width = records
        .iter()
        .map(|r| r.title.chars().count())
        .max()
        .unwrap_or(0)
        + 5;
    let result_width = records
        .iter()
        .map(|r| r.result.chars().count())
        .max()
        .unwrap_or(0)
        + 2;
    let separator = "-".repeat(title_width + result_width + 4);

    writeln!(out, "Result table with checks and their results for {heading}:")?;
    writeln!(out, "{separator}")?;
    for line in sorted_by_priority(lines) {
        match ResultRecord::parse(line) {
            Some(record) => writeln!(
                out,
                "|{title:<title_width$} |{result:<result_width$}|",
                title = record.title,
                result = record.result.trim(),
            )?,
            None => error!("{line}"),
        }
    }
    writeln!(out, "{separator}")?;
    Ok(out)
}

/// Stable sort by descending priority string: `99` first, then `09` down to `01`.
fn sorted_by_priority<S: AsRef<str>>(lines: &[S]) -> Vec<&str> {
    let mut sorted: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
    sorted.sort_by(|a, b| priority(b).cmp(&priority(a)));
    sorted
}

#[derive(Debug, Serialize)]
struct JsonRow<'a> {
    title: &'a str,
    rule_id: &'a str,
    result: &'a str,
    priority: &'static str,
}

impl<'a> From<ResultRecord<'a>> for JsonRow<'a> {
    fn from(record: ResultRecord<'a>) -> Self {
        Self {
            title: record.title,
            rule_id: record.rule_id,
            result: record.result,
            priority: record.code().priority(),
        }
    }
}
