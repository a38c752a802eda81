use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::report::ResultCode;
use crate::tree::{Depth, Element};

static RISK_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^preupg\.risk\.(?i:(NONE|SLIGHT|MEDIUM|HIGH)):").expect("risk marker regex is valid")
});

/// Severity of an in-place risk reported by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Slight,
    Medium,
    High,
}

impl RiskLevel {
    fn from_marker(level: &str) -> Option<Self> {
        match level.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "slight" => Some(Self::Slight),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Result a `fail` is rewritten to when this is the highest reported risk.
    pub fn fail_target(self) -> ResultCode {
        match self {
            Self::None => ResultCode::Error,
            Self::Slight | Self::Medium => ResultCode::NeedsInspection,
            Self::High => ResultCode::NeedsAction,
        }
    }
}

/// A risk marker line found in module output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAnnotation {
    pub level: RiskLevel,
    pub line: String,
}

/// Parse a single line of check-import text as a risk marker.
pub fn parse_risk_line(line: &str) -> Option<RiskAnnotation> {
    let captures = RISK_MARKER.captures(line.trim_start())?;
    let level = RiskLevel::from_marker(captures.get(1)?.as_str())?;
    Some(RiskAnnotation {
        level,
        line: line.trim().to_string(),
    })
}

/// All risk markers found in the `check/check-import` text of a rule-result.
pub fn check_import_risks(rule_result: &Element) -> Vec<RiskAnnotation> {
    rule_result
        .find_all("check", Depth::Children)
        .into_iter()
        .flat_map(|check| check.find_all("check-import", Depth::Children))
        .filter_map(Element::text)
        .flat_map(|text| text.lines().filter_map(parse_risk_line).collect::<Vec<_>>())
        .collect()
}

/// Highest risk level among `risks`, if any were reported.
pub fn aggregate(risks: &[RiskAnnotation]) -> Option<RiskLevel> {
    risks.iter().map(|risk| risk.level).max()
}
