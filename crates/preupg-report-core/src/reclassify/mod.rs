use std::{collections::BTreeMap, fmt, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::report::{ResultCode, ResultRecord};
use crate::tree::{Depth, Element, ReportTree, TreeError, XccdfVersion};

pub mod globals;
pub mod risk;

pub use globals::GlobalValues;
pub use risk::{RiskAnnotation, RiskLevel};

static DEBUG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^preupg.log.DEBUG.*").expect("debug line regex is valid"));

const STD_STREAMS: [&str; 2] = ["stdout", "stderr"];
/// Padding the scanner wraps around captured module output.
const STREAM_LEADING_PAD: &str = "\n";
const STREAM_TRAILING_PAD: &str = "\n\n          \n";
const DETAILS_MARKER: &str = "Details:";
const EXPECTED_RESULTS_MARKER: &str = "Expected results:";

/// Errors that abort a pass over the report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("rule-result `{rule_id}` has no result node; the report is corrupt")]
    MissingResult { rule_id: String },
}

/// Why a rule's result was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "level", rename_all = "snake_case")]
pub enum ChangeReason {
    /// `fail` mapped through the highest reported risk level.
    RiskLevel(RiskLevel),
    FailWithoutRisk,
    RiskOnNonFail,
    UnknownResult,
}

impl ChangeReason {
    /// True for data-consistency anomalies that were forced to `error`.
    pub fn is_anomaly(self) -> bool {
        !matches!(self, Self::RiskLevel(_))
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RiskLevel(level) => write!(f, "risk level {level:?}"),
            Self::FailWithoutRisk => f.write_str("fail without risk evidence"),
            Self::RiskOnNonFail => f.write_str("risk evidence on a non-fail result"),
            Self::UnknownResult => f.write_str("unknown result"),
        }
    }
}

/// A rule whose result was rewritten during reclassification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedResult {
    pub rule_id: String,
    pub result: ResultCode,
    pub reason: ChangeReason,
}

/// Receiver for reclassified results, e.g. the scan progress records.
pub trait ResultSink {
    fn apply_changes(&mut self, changed: &[ChangedResult]);
}

/// `title:rule_id:result` lines; the result field of a reclassified rule is
/// rewritten and every other line is left untouched.
impl ResultSink for Vec<String> {
    fn apply_changes(&mut self, changed: &[ChangedResult]) {
        for line in self.iter_mut() {
            let Some(record) = ResultRecord::parse(line.as_str()) else {
                continue;
            };
            if let Some(change) = changed.iter().find(|c| c.rule_id == record.rule_id) {
                let updated = format!("{}:{}:{}", record.title, record.rule_id, change.result);
                *line = updated;
            }
        }
    }
}

/// Borrowed view of a `check-import` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckImport<'a> {
    pub import_name: &'a str,
    pub text: String,
}

/// Borrowed view of a `rule-result` node.
#[derive(Debug, Clone)]
pub struct RuleResult<'a> {
    pub rule_id: &'a str,
    pub raw_result: Option<String>,
    pub check_imports: Vec<CheckImport<'a>>,
    node: &'a Element,
}

impl<'a> RuleResult<'a> {
    fn new(node: &'a Element) -> Self {
        let check_imports = node
            .find_all("check", Depth::Children)
            .into_iter()
            .flat_map(|check| check.find_all("check-import", Depth::Children))
            .map(|import| CheckImport {
                import_name: import.get("import-name").unwrap_or_default(),
                text: import.all_text().unwrap_or_default(),
            })
            .collect();
        Self {
            rule_id: node.get("idref").unwrap_or_default(),
            raw_result: node
                .find("result", Depth::Children)
                .map(|result| result.text().unwrap_or_default()),
            check_imports,
            node,
        }
    }

    pub fn risks(&self) -> Vec<RiskAnnotation> {
        risk::check_import_risks(self.node)
    }
}

/// Decide the final result for a raw result and its risk evidence.
///
/// Returns `None` when the result stays as it is.
pub fn classify(raw: &str, risks: &[RiskAnnotation]) -> Option<(ResultCode, ChangeReason)> {
    let code = ResultCode::parse(raw.trim());
    match (code, risk::aggregate(risks)) {
        (ResultCode::Fail, None) => Some((ResultCode::Error, ChangeReason::FailWithoutRisk)),
        (ResultCode::Fail, Some(level)) => Some((level.fail_target(), ChangeReason::RiskLevel(level))),
        (_, Some(_)) => Some((ResultCode::Error, ChangeReason::RiskOnNonFail)),
        (ResultCode::Unrecognized(keyword), None) if keyword == "unknown" => {
            Some((ResultCode::Error, ChangeReason::UnknownResult))
        }
        _ => None,
    }
}

/// Applies the post-scan passes to an XCCDF result report.
///
/// Every pass consumes the parser and returns it holding the document
/// reloaded from disk after the pass was persisted.
#[derive(Debug, Clone)]
pub struct ReportParser {
    tree: ReportTree,
}

impl ReportParser {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        Ok(Self::from_tree(ReportTree::load(path.as_ref())?))
    }

    pub fn from_tree(tree: ReportTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &ReportTree {
        &self.tree
    }

    pub fn into_tree(self) -> ReportTree {
        self.tree
    }

    pub fn path(&self) -> &Path {
        self.tree.path()
    }

    fn persist(self) -> Result<Self, ReportError> {
        Ok(Self::from_tree(self.tree.persist()?))
    }

    /// Views over every `TestResult/rule-result`, in document order.
    pub fn rule_results(&self) -> Vec<RuleResult<'_>> {
        self.tree
            .root()
            .find_grandchildren("TestResult", "rule-result")
            .into_iter()
            .map(RuleResult::new)
            .collect()
    }

    /// Text of every `rule-result/result` node.
    pub fn all_results(&self) -> Vec<String> {
        self.rule_results()
            .into_iter()
            .filter_map(|rule| rule.raw_result)
            .collect()
    }

    fn selects(&self) -> Vec<&Element> {
        self.tree.root().find_grandchildren("Profile", "select")
    }

    /// Rule ids referenced by the profile selects.
    pub fn list_rules(&self) -> Vec<String> {
        self.selects()
            .into_iter()
            .filter_map(|select| select.get("idref"))
            .filter(|idref| !idref.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Number of rules the profile actually selects.
    pub fn number_of_checks(&self) -> usize {
        self.selects()
            .into_iter()
            .filter(|select| select.get("selected") == Some("true"))
            .count()
    }

    /// Display labels (rule titles) of the selected rules keyed by rule id.
    pub fn check_labels(&self) -> BTreeMap<String, String> {
        let rules = self.tree.root().find_all("Rule", Depth::Descendants);
        self.selects()
            .into_iter()
            .filter(|select| select.get("selected") == Some("true"))
            .map(|select| {
                let id = select.get("idref").unwrap_or_default();
                let title = match rules.iter().find(|rule| rule.get("id") == Some(id)) {
                    Some(rule) => rule.child_text("title"),
                    None => {
                        warn!(rule_id = id, "selected rule has no definition");
                        String::new()
                    }
                };
                (id.to_string(), title)
            })
            .collect()
    }

    /// Requested ids that match no profile select; a select matches when its
    /// idref contains the requested id.
    pub fn check_rules<S: AsRef<str>>(&self, requested: &[S]) -> Vec<String> {
        let known = self.list_rules();
        requested
            .iter()
            .map(AsRef::as_ref)
            .filter(|id| !known.iter().any(|idref| idref.contains(*id)))
            .map(str::to_string)
            .collect()
    }

    /// Mark exactly the rules in `allowed` as selected.
    #[instrument(skip_all, fields(allowed = allowed.len()))]
    pub fn select_rules<S: AsRef<str>>(mut self, allowed: &[S]) -> Result<Self, ReportError> {
        self.tree
            .root_mut()
            .for_each_grandchild_mut("Profile", "select", &mut |select| {
                let idref = select.get("idref").unwrap_or_default().to_string();
                let selected = allowed.iter().any(|id| id.as_ref() == idref);
                debug!(rule_id = %idref, selected, "select");
                select.set("selected", if selected { "true" } else { "false" });
            });
        self.persist()
    }

    /// Drop `stdout`/`stderr` check-imports that carry no output.
    pub fn remove_empty_check_import(mut self) -> Result<Self, ReportError> {
        let is_std = |node: &Element| {
            node.is("check-import")
                && STD_STREAMS.contains(&node.get("import-name").unwrap_or_default())
        };
        self.tree
            .root_mut()
            .for_each_grandchild_mut("TestResult", "rule-result", &mut |rule| {
                rule.for_each_mut("check", Depth::Children, &mut |check| {
                    check.children.retain(|child| match child {
                        crate::tree::Node::Element(node) if is_std(node) => {
                            !node.all_text().unwrap_or_default().trim().is_empty()
                        }
                        _ => true,
                    });
                });
            });
        self.persist()
    }

    /// Reclassify raw results using in-place risk evidence.
    ///
    /// Returns the rewritten rules and forwards them to `sink` when given.
    #[instrument(skip_all, fields(report = %self.path().display()))]
    pub fn replace_inplace_risk(
        self,
        sink: Option<&mut dyn ResultSink>,
    ) -> Result<(Self, Vec<ChangedResult>), ReportError> {
        let mut parser = self.remove_empty_check_import()?;

        let mut decisions = Vec::new();
        for rule in parser.rule_results() {
            let raw = rule.raw_result.as_deref().ok_or_else(|| ReportError::MissingResult {
                rule_id: rule.rule_id.to_string(),
            })?;
            let risks = rule.risks();
            let decision = classify(raw, &risks).map(|(result, reason)| {
                log_change(rule.rule_id, raw, &risks, &result, reason);
                ChangedResult {
                    rule_id: rule.rule_id.to_string(),
                    result,
                    reason,
                }
            });
            decisions.push(decision);
        }

        let mut index = 0;
        parser
            .tree
            .root_mut()
            .for_each_grandchild_mut("TestResult", "rule-result", &mut |rule| {
                if let Some(Some(change)) = decisions.get(index) {
                    rule.for_each_mut("result", Depth::Children, &mut |result| {
                        result.set_text(change.result.as_str());
                    });
                }
                index += 1;
            });

        let changed: Vec<ChangedResult> = decisions.into_iter().flatten().collect();
        if let Some(sink) = sink {
            sink.apply_changes(&changed);
        }
        Ok((parser.persist()?, changed))
    }

    /// Trim the scanner's fixed padding around captured module output.
    pub fn strip_whitespaces(mut self) -> Result<Self, ReportError> {
        self.tree
            .root_mut()
            .for_each_mut("check-import", Depth::Descendants, &mut |import| {
                if !STD_STREAMS.contains(&import.get("import-name").unwrap_or_default()) {
                    return;
                }
                let Some(text) = import.text() else { return };
                if text.starts_with(STREAM_LEADING_PAD) && text.ends_with(STREAM_TRAILING_PAD) {
                    let end = text.len().saturating_sub(STREAM_TRAILING_PAD.len());
                    let stripped = text.get(STREAM_LEADING_PAD.len()..end).unwrap_or_default();
                    import.set_text(stripped);
                }
            });
        self.persist()
    }

    /// Remove module debug log lines from check-import text.
    pub fn remove_debug_info(mut self) -> Result<Self, ReportError> {
        self.tree
            .root_mut()
            .for_each_grandchild_mut("TestResult", "rule-result", &mut |rule| {
                rule.for_each_grandchild_mut("check", "check-import", &mut |import| {
                    if let Some(text) = import.text() {
                        let kept: Vec<&str> = text
                            .split('\n')
                            .filter(|line| !DEBUG_LINE.is_match(line))
                            .collect();
                        import.set_text(kept.join("\n"));
                    }
                });
            });
        self.persist()
    }

    /// Switch the report between the XCCDF 1.1 and 1.2 namespaces.
    pub fn rewrite_namespace(self, target: XccdfVersion) -> Result<Self, ReportError> {
        Ok(Self::from_tree(self.tree.rewrite_namespace(target)?))
    }

    /// Turn the `Details:` and `Expected results:` markers of rule
    /// descriptions into paired inline tags.
    pub fn update_check_description(mut self) -> Result<Self, ReportError> {
        debug!("update check description");
        self.tree
            .root_mut()
            .for_each_mut("Rule", Depth::Descendants, &mut |rule| {
                rule.for_each_mut("description", Depth::Children, &mut |description| {
                    let Some(text) = description.text() else { return };
                    if let Some(updated) = tag_description(&text, description.prefix()) {
                        description.set_text(updated);
                    }
                });
            });
        self.persist()
    }

    /// Replace the `SCENARIO` placeholder in `*_current_dir*` Values.
    pub fn modify_result_path(mut self, result_dir: &Path, scenario: &str) -> Result<Self, ReportError> {
        let target = result_dir.join(scenario).display().to_string();
        self.tree
            .root_mut()
            .for_each_mut("Value", Depth::Descendants, &mut |value| {
                if !value.get("id").unwrap_or_default().contains("_current_dir") {
                    return;
                }
                value.for_each_mut("value", Depth::Children, &mut |node| {
                    if let Some(text) = node.text() {
                        debug!(from = %text, to = %target, "replace scenario path");
                        node.set_text(text.replace("SCENARIO", &target));
                    }
                });
            });
        self.persist()
    }

    /// Insert or update the global Values after every Profile.
    #[instrument(skip_all)]
    pub fn add_global_tags(mut self, values: &GlobalValues) -> Result<Self, ReportError> {
        globals::apply(self.tree.root_mut(), values);
        self.persist()
    }
}

fn log_change(rule_id: &str, raw: &str, risks: &[RiskAnnotation], result: &ResultCode, reason: ChangeReason) {
    match reason {
        ChangeReason::RiskOnNonFail => {
            let found: Vec<&str> = risks.iter().map(|risk| risk.line.as_str()).collect();
            error!(
                rule_id,
                raw,
                risks = %found.join("|"),
                "module with result '{raw}' can't have any in-place risks, setting the result to 'error'"
            );
        }
        ChangeReason::FailWithoutRisk => {
            error!(rule_id, "the result of {rule_id} module is 'fail' but without any risk");
        }
        ChangeReason::UnknownResult => {
            error!(rule_id, "detected 'unknown' result of module {rule_id}, setting the result to 'error'");
        }
        ChangeReason::RiskLevel(level) => {
            debug!(rule_id, ?level, "result 'fail' replaced with '{result}'");
        }
    }
}

fn tag_description(text: &str, prefix: Option<&str>) -> Option<String> {
    let tag = |local: &str| match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    };
    let details = tag("details");
    let expected = tag("expected-results");
    let lang = r#" xml:lang="en""#;

    let mut found = false;
    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with(DETAILS_MARKER) {
            found = true;
            lines.push(line.replacen(DETAILS_MARKER, &format!("<{details}{lang}>"), 1));
        } else if trimmed.starts_with(EXPECTED_RESULTS_MARKER) {
            found = true;
            lines.push(line.replacen(
                EXPECTED_RESULTS_MARKER,
                &format!("</{details}>\n<{expected}{lang}>"),
                1,
            ));
        } else {
            lines.push(line.to_string());
        }
    }
    if !found {
        return None;
    }
    lines.push(format!("</{expected}>"));
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;
    use std::fs;
    use std::path::PathBuf;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Benchmark xmlns="http://checklists.nist.gov/xccdf/1.2" id="preupg">
  <Profile id="xccdf_preupg_profile_default">
    <select idref="xccdf_preupg_rule_a" selected="true"/>
    <select idref="xccdf_preupg_rule_b" selected="true"/>
    <select idref="xccdf_preupg_rule_c" selected="false"/>
  </Profile>
  <Value id="xccdf_preupg_value_a_state_current_directory"><value>SCENARIO/a</value></Value>
  <Group id="xccdf_preupg_group_g">
    <Rule id="xccdf_preupg_rule_a"><title>Check A</title><description>Intro
Details: what happens
Expected results: nothing</description></Rule>
    <Rule id="xccdf_preupg_rule_b"><title>Check B</title><description>plain</description></Rule>
  </Group>
  <TestResult id="tr">
    <rule-result idref="xccdf_preupg_rule_a">
      <result>fail</result>
      <check system="sh">
        <check-import import-name="stdout">preupg.risk.HIGH: breaks
preupg.log.DEBUG: noisy</check-import>
        <check-import import-name="stderr">   </check-import>
      </check>
    </rule-result>
    <rule-result idref="xccdf_preupg_rule_b">
      <result>pass</result>
      <check system="sh"><check-import import-name="stdout">
all good

          
</check-import></check>
    </rule-result>
  </TestResult>
</Benchmark>
"#;

    fn report(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("result.xml");
        fs::write(&path, contents).unwrap();
        (temp, path)
    }

    fn risk(level: &str) -> Vec<RiskAnnotation> {
        risk::parse_risk_line(&format!("preupg.risk.{level}: msg"))
            .into_iter()
            .collect()
    }

    #[test]
    fn classification_state_machine() {
        assert_eq!(
            classify("fail", &[]),
            Some((ResultCode::Error, ChangeReason::FailWithoutRisk))
        );
        assert_eq!(classify("fail", &risk("HIGH")).unwrap().0, ResultCode::NeedsAction);
        assert_eq!(classify("fail", &risk("MEDIUM")).unwrap().0, ResultCode::NeedsInspection);
        assert_eq!(classify("fail", &risk("SLIGHT")).unwrap().0, ResultCode::NeedsInspection);
        assert_eq!(classify("fail", &risk("NONE")).unwrap().0, ResultCode::Error);
        assert_eq!(
            classify("pass", &risk("HIGH")),
            Some((ResultCode::Error, ChangeReason::RiskOnNonFail))
        );
        assert_eq!(
            classify("unknown", &[]),
            Some((ResultCode::Error, ChangeReason::UnknownResult))
        );
        assert_eq!(classify("unknown", &risk("SLIGHT")).unwrap().0, ResultCode::Error);
        assert_eq!(classify("pass", &[]), None);
        assert_eq!(classify("notapplicable", &[]), None);
    }

    #[test]
    fn reclassifies_and_persists_results() {
        let (_temp, path) = report(REPORT);
        let parser = ReportParser::open(&path).unwrap();
        let (parser, changed) = parser.replace_inplace_risk(None).unwrap();

        assert_eq!(
            changed,
            vec![ChangedResult {
                rule_id: "xccdf_preupg_rule_a".into(),
                result: ResultCode::NeedsAction,
                reason: ChangeReason::RiskLevel(RiskLevel::High),
            }]
        );
        assert_eq!(parser.all_results(), vec!["needs_action", "pass"]);
        assert_eq!(parser.tree().revision(), 2);

        let reloaded = ReportParser::open(&path).unwrap();
        assert_eq!(reloaded.all_results(), vec!["needs_action", "pass"]);
        let imports: Vec<_> = reloaded.rule_results()[0]
            .check_imports
            .iter()
            .map(|import| import.import_name)
            .collect();
        assert_eq!(imports, vec!["stdout"]);
    }

    #[test]
    fn missing_result_aborts_without_rewriting() {
        let (_temp, path) = report(
            r#"<Benchmark xmlns="http://checklists.nist.gov/xccdf/1.2"><TestResult>
<rule-result idref="r1"><result>fail</result></rule-result>
<rule-result idref="r2"><check/></rule-result>
</TestResult></Benchmark>"#,
        );
        let err = ReportParser::open(&path)
            .unwrap()
            .replace_inplace_risk(None)
            .unwrap_err();
        assert!(matches!(err, ReportError::MissingResult { rule_id } if rule_id == "r2"));
        let reloaded = ReportParser::open(&path).unwrap();
        assert_eq!(reloaded.all_results(), vec!["fail"]);
    }

    #[test]
    fn forwards_changes_to_sink() {
        struct Recorder(Vec<ChangedResult>);
        impl ResultSink for Recorder {
            fn apply_changes(&mut self, changed: &[ChangedResult]) {
                self.0.extend_from_slice(changed);
            }
        }

        let (_temp, path) = report(REPORT);
        let mut recorder = Recorder(Vec::new());
        ReportParser::open(&path)
            .unwrap()
            .replace_inplace_risk(Some(&mut recorder))
            .unwrap();
        assert_eq!(recorder.0.len(), 1);
        assert_eq!(recorder.0[0].result, ResultCode::NeedsAction);
    }

    #[test]
    fn strips_padding_and_debug_lines() {
        let (_temp, path) = report(REPORT);
        let parser = ReportParser::open(&path)
            .unwrap()
            .strip_whitespaces()
            .unwrap()
            .remove_debug_info()
            .unwrap();
        let rules = parser.rule_results();
        assert_eq!(rules[0].check_imports[0].text, "preupg.risk.HIGH: breaks");
        assert_eq!(rules[1].check_imports[0].text, "all good");
    }

    #[test]
    fn selects_and_validates_rules() {
        let (_temp, path) = report(REPORT);
        let parser = ReportParser::open(&path).unwrap();
        assert_eq!(parser.number_of_checks(), 2);
        assert_eq!(
            parser.check_rules(&["rule_a", "xccdf_preupg_rule_z"]),
            vec!["xccdf_preupg_rule_z"]
        );

        let parser = parser.select_rules(&["xccdf_preupg_rule_c"]).unwrap();
        assert_eq!(parser.number_of_checks(), 1);
        assert_eq!(
            parser.list_rules(),
            vec!["xccdf_preupg_rule_a", "xccdf_preupg_rule_b", "xccdf_preupg_rule_c"]
        );
    }

    #[test]
    fn labels_come_from_rule_titles() {
        let (_temp, path) = report(REPORT);
        let labels = ReportParser::open(&path).unwrap().check_labels();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["xccdf_preupg_rule_a"], "Check A");
        assert_eq!(labels["xccdf_preupg_rule_b"], "Check B");
    }

    #[test]
    fn description_markers_become_tags() {
        let updated = tag_description("Intro\nDetails: what\n Expected results: none", None).unwrap();
        assert_eq!(
            updated,
            "Intro\n<details xml:lang=\"en\"> what\n </details>\n<expected-results xml:lang=\"en\"> none\n</expected-results>"
        );
        assert!(tag_description("plain", None).is_none());

        let (_temp, path) = report(REPORT);
        let parser = ReportParser::open(&path).unwrap().update_check_description().unwrap();
        let rule = parser.tree().root().find("Rule", Depth::Descendants).unwrap();
        assert!(rule.child_text("description").ends_with("</expected-results>"));
    }

    #[test]
    fn description_markup_keeps_its_position() {
        let (_temp, path) = report(
            r#"<Benchmark xmlns="http://checklists.nist.gov/xccdf/1.2" xmlns:h="http://www.w3.org/1999/xhtml">
<Rule id="r1"><description>Intro
Details: d
Expected results: e<h:b>bold</h:b> tail</description></Rule>
<Rule id="r2"><description>Intro <h:b>bold</h:b> tail
Details: d
Expected results: e</description></Rule>
</Benchmark>"#,
        );
        let parser = ReportParser::open(&path).unwrap().update_check_description().unwrap();
        let rules = parser.tree().root().find_all("Rule", Depth::Children);

        let tagged = &rules[0].find("description", Depth::Children).unwrap().children;
        assert_eq!(tagged.len(), 3);
        assert!(matches!(&tagged[0], Node::Text(t) if t.ends_with("</expected-results>")));
        assert!(matches!(&tagged[1], Node::Element(e) if e.local_name() == "b"));
        assert!(matches!(&tagged[2], Node::Text(t) if t == " tail"));

        let untouched = &rules[1].find("description", Depth::Children).unwrap().children;
        assert!(matches!(&untouched[0], Node::Text(t) if t == "Intro "));
        assert!(matches!(&untouched[1], Node::Element(e) if e.local_name() == "b"));
        assert!(matches!(&untouched[2], Node::Text(t) if t.starts_with(" tail\nDetails:")));
    }

    #[test]
    fn global_values_follow_profile_in_declared_order() {
        let (_temp, path) = report(REPORT);
        let values = GlobalValues {
            result_dir: PathBuf::from("/root/preupgrade"),
            scenario: "RHEL6_7".into(),
            mode: None,
            devel_mode: true,
            dist_native: None,
        };
        let parser = ReportParser::open(&path)
            .unwrap()
            .add_global_tags(&values)
            .unwrap()
            .add_global_tags(&values)
            .unwrap();

        let root = parser.tree().root();
        let names: Vec<String> = root
            .elements()
            .map(|e| e.get("id").unwrap_or(e.local_name()).to_string())
            .collect();
        assert_eq!(
            &names[..8],
            [
                "xccdf_preupg_profile_default",
                "xccdf_preupg_value_tmp_preupgrade",
                "xccdf_preupg_value_report_dir",
                "xccdf_preupg_value_migrate",
                "xccdf_preupg_value_upgrade",
                "xccdf_preupg_value_devel_mode",
                "xccdf_preupg_value_dist_native",
                "xccdf_preupg_value_a_state_current_directory",
            ]
        );
        let report_dir = root.find_all("Value", Depth::Children)[1];
        assert_eq!(report_dir.child_text("value"), "/root/preupgrade/RHEL6_7");
        assert_eq!(report_dir.get("type"), Some("string"));
    }

    #[test]
    fn result_path_placeholder_is_replaced() {
        let (_temp, path) = report(
            r#"<Benchmark xmlns="http://checklists.nist.gov/xccdf/1.2">
<Value id="xccdf_preupg_value_a_state_current_dir"><value>SCENARIO/a</value></Value>
<Value id="xccdf_preupg_value_other"><value>SCENARIO</value></Value>
</Benchmark>"#,
        );
        let parser = ReportParser::open(&path)
            .unwrap()
            .modify_result_path(Path::new("/tmp/results"), "RHEL6_7")
            .unwrap();
        let values = parser.tree().root().find_all("Value", Depth::Children);
        assert_eq!(values[0].child_text("value"), "/tmp/results/RHEL6_7/a");
        assert_eq!(values[1].child_text("value"), "SCENARIO");
    }
}
