use std::io::{self, Write};

use tracing::{debug, info};

use crate::reclassify::{ChangedResult, ResultSink};

const BACKSPACE: char = '\u{8}';
/// Width of the `NNN/TTT ` prefix and the decoration around the label that
/// the next completion has to back up over.
const STATUS_PREFIX_LEN: usize = 7;
const STATUS_SUFFIX_LEN: usize = 3;

/// A check the scan will run, with the label shown while it executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDescriptor {
    pub id: String,
    pub label: String,
}

/// Tracks completed checks and drives the live status line during a scan.
///
/// Completions must be recorded in the order the checks run: the position
/// of a completion selects the label shown for it.
pub struct ScanProgress<W: Write = io::Stdout> {
    total_count: usize,
    current_count: usize,
    output_data: Vec<String>,
    verbose: bool,
    checks: Vec<CheckDescriptor>,
    out: W,
}

impl ScanProgress<io::Stdout> {
    pub fn new(total_count: usize, verbose: bool) -> Self {
        Self::with_writer(total_count, verbose, io::stdout())
    }
}

impl<W: Write> ScanProgress<W> {
    pub fn with_writer(total_count: usize, verbose: bool, out: W) -> Self {
        Self {
            total_count,
            current_count: 0,
            output_data: Vec::new(),
            verbose,
            checks: Vec::new(),
            out,
        }
    }

    /// Store check labels keyed by check id; checks are ordered by id.
    pub fn set_labels<I, K, V>(&mut self, labels: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut checks: Vec<CheckDescriptor> = labels
            .into_iter()
            .map(|(id, label)| CheckDescriptor {
                id: id.into(),
                label: label.into(),
            })
            .collect();
        checks.sort_by(|a, b| a.id.cmp(&b.id));
        self.checks = checks;
    }

    /// Label of the check at `index`, or an empty string past the end.
    pub fn label_at(&self, index: usize) -> &str {
        self.checks
            .get(index)
            .map(|check| check.label.as_str())
            .unwrap_or_default()
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn current_count(&self) -> usize {
        self.current_count
    }

    /// Print the status line for the first check.
    pub fn begin(&mut self) -> io::Result<()> {
        if self.verbose || self.total_count == 0 {
            return Ok(());
        }
        let label = self.label_at(0).to_string();
        write!(self.out, "{:03}/{:03} ...running ({label})", 1, self.total_count)?;
        self.out.flush()
    }

    /// Record one finished check reported as `<title>:<rule_id>:<result>`.
    pub fn record_completion(&mut self, raw_line: &str) -> io::Result<()> {
        self.output_data.push(raw_line.trim().to_string());
        self.current_count += 1;
        let previous = self.label_at(self.current_count - 1).to_string();
        let next = self.label_at(self.current_count).to_string();
        let remaining = self.total_count > self.current_count;

        if self.verbose {
            info!("{raw_line}");
            if remaining {
                info!("{next}");
            }
        } else {
            let back: String = std::iter::repeat(BACKSPACE)
                .take(STATUS_PREFIX_LEN + previous.chars().count() + STATUS_SUFFIX_LEN)
                .collect();
            writeln!(self.out, "{back}done    ({previous})")?;
            if remaining {
                write!(
                    self.out,
                    "{:03}/{:03} ...running ({next})",
                    self.current_count + 1,
                    self.total_count
                )?;
            }
            self.out.flush()?;
        }
        debug!(target: "preupg::progress", "{}", raw_line.trim());
        Ok(())
    }

    /// Result lines collected so far, in completion order.
    pub fn accumulated_results(&self) -> &[String] {
        &self.output_data
    }

    pub fn writer(&self) -> &W {
        &self.out
    }
}

impl<W: Write> ResultSink for ScanProgress<W> {
    /// Rewrite the result field of lines whose rule id was reclassified.
    fn apply_changes(&mut self, changed: &[ChangedResult]) {
        self.output_data.apply_changes(changed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reclassify::ChangeReason;
    use crate::report::{ResultCode, ResultRecord};
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    fn tracker(total: usize, verbose: bool) -> ScanProgress<Vec<u8>> {
        let mut progress = ScanProgress::with_writer(total, verbose, Vec::new());
        progress.set_labels([
            ("xccdf_preupg_rule_b", "Check B"),
            ("xccdf_preupg_rule_a", "Check A"),
            ("xccdf_preupg_rule_c", "Check C"),
        ]);
        progress
    }

    fn changed(rule_id: &str, result: ResultCode) -> ChangedResult {
        ChangedResult {
            rule_id: rule_id.into(),
            result,
            reason: ChangeReason::FailWithoutRisk,
        }
    }

    #[test]
    fn labels_are_ordered_by_id_and_bounds_checked() {
        let progress = tracker(3, false);
        assert_eq!(progress.label_at(0), "Check A");
        assert_eq!(progress.label_at(2), "Check C");
        assert_eq!(progress.label_at(3), "");
        assert_eq!(progress.label_at(usize::MAX), "");
    }

    #[test]
    fn counts_every_completion_including_malformed_lines() {
        let mut progress = tracker(3, false);
        progress.record_completion("Check A:xccdf_preupg_rule_a:pass\n").unwrap();
        progress.record_completion("bad-line").unwrap();
        progress.record_completion("Check C:xccdf_preupg_rule_c:fail").unwrap();
        assert_eq!(progress.current_count(), 3);
        assert_eq!(
            progress.accumulated_results(),
            ["Check A:xccdf_preupg_rule_a:pass", "bad-line", "Check C:xccdf_preupg_rule_c:fail"]
        );
    }

    #[test]
    fn terse_mode_rewrites_status_line() {
        let mut progress = tracker(2, false);
        progress.begin().unwrap();
        progress.record_completion("Check A:xccdf_preupg_rule_a:pass").unwrap();
        progress.record_completion("Check B:xccdf_preupg_rule_b:pass").unwrap();

        let output = String::from_utf8(progress.writer().clone()).unwrap();
        let back = "\u{8}".repeat(7 + "Check A".len() + 3);
        let expected = format!(
            "001/002 ...running (Check A){back}done    (Check A)\n002/002 ...running (Check B){}done    (Check B)\n",
            "\u{8}".repeat(7 + "Check B".len() + 3)
        );
        assert_eq!(output, expected);
    }

    #[test]
    fn verbose_mode_writes_nothing_to_the_status_sink() {
        let mut progress = tracker(1, true);
        progress.begin().unwrap();
        progress.record_completion("Check A:xccdf_preupg_rule_a:pass").unwrap();
        assert!(progress.writer().is_empty());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Run `f` under a DEBUG-level subscriber and return `(level, target, message)` per event.
    fn logged(f: impl FnOnce()) -> Vec<(String, String, String)> {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| {
                let (head, message) = line.split_once(": ").unwrap();
                let mut head = head.split_whitespace();
                let level = head.next().unwrap().to_string();
                let target = head.next().unwrap().to_string();
                (level, target, message.to_string())
            })
            .collect()
    }

    #[test]
    fn verbose_mode_logs_line_then_next_label() {
        let mut progress = tracker(2, true);
        let events = logged(|| {
            progress.record_completion("Check A:xccdf_preupg_rule_a:pass").unwrap();
            progress.record_completion("Check B:xccdf_preupg_rule_b:fail").unwrap();
        });
        let events: Vec<(&str, &str)> = events
            .iter()
            .map(|(level, _, message)| (level.as_str(), message.as_str()))
            .collect();
        assert_eq!(
            events,
            [
                ("INFO", "Check A:xccdf_preupg_rule_a:pass"),
                ("INFO", "Check B"),
                ("DEBUG", "Check A:xccdf_preupg_rule_a:pass"),
                ("INFO", "Check B:xccdf_preupg_rule_b:fail"),
                ("DEBUG", "Check B:xccdf_preupg_rule_b:fail"),
            ]
        );
    }

    #[test]
    fn terse_mode_only_records_trimmed_lines_at_debug() {
        let mut progress = tracker(2, false);
        let events = logged(|| {
            progress.begin().unwrap();
            progress.record_completion("  Check A:xccdf_preupg_rule_a:pass\n").unwrap();
        });
        assert_eq!(
            events,
            [(
                "DEBUG".to_string(),
                "preupg::progress".to_string(),
                "Check A:xccdf_preupg_rule_a:pass".to_string()
            )]
        );
        assert!(!progress.writer().is_empty());
    }

    #[test]
    fn applies_changes_by_exact_rule_id() {
        let mut progress = tracker(4, true);
        for line in [
            "Check A:xccdf_preupg_rule_a:fail",
            "Check AA:xccdf_preupg_rule_aa:fail",
            "not a result",
            "Check C:xccdf_preupg_rule_c:unknown",
        ] {
            progress.record_completion(line).unwrap();
        }
        progress.apply_changes(&[
            changed("xccdf_preupg_rule_a", ResultCode::NeedsAction),
            changed("xccdf_preupg_rule_c", ResultCode::Error),
        ]);
        assert_eq!(
            progress.accumulated_results(),
            [
                "Check A:xccdf_preupg_rule_a:needs_action",
                "Check AA:xccdf_preupg_rule_aa:fail",
                "not a result",
                "Check C:xccdf_preupg_rule_c:error",
            ]
        );
    }

    proptest! {
        #[test]
        fn unchanged_lines_stay_byte_identical(
            lines in proptest::collection::vec("[A-Za-z :_]{0,24}", 1..12),
            target in "[a-z_]{1,8}",
        ) {
            let mut progress = ScanProgress::with_writer(lines.len(), true, Vec::new());
            for line in &lines {
                progress.record_completion(line).unwrap();
            }
            let before = progress.accumulated_results().to_vec();
            progress.apply_changes(&[changed(&target, ResultCode::Error)]);
            for (old, new) in before.iter().zip(progress.accumulated_results()) {
                let touched = ResultRecord::parse(old).map(|r| r.rule_id == target).unwrap_or(false);
                if touched {
                    prop_assert!(new.ends_with(":error"));
                } else {
                    prop_assert_eq!(old, new);
                }
            }
        }
    }
}
