pub mod progress;
pub mod reclassify;
pub mod report;
pub mod tree;

pub use progress::{CheckDescriptor, ScanProgress};
pub use reclassify::{
    classify, ChangeReason, ChangedResult, CheckImport, GlobalValues, ReportError, ReportParser,
    ResultSink, RiskAnnotation, RiskLevel, RuleResult,
};
pub use report::{
    format_rules_to_table, priority, render_results, OutputFormat, ResultCode, ResultRecord,
};
pub use tree::{Depth, Element, ReportTree, TreeError, XccdfVersion};
