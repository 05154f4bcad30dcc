// Result accumulation for one job.
//
// A builder lives exactly as long as one job's execution and is passed by
// `&mut` down the call chain. `finish` always yields a well-formed value.

use crate::sequencer::SequenceReport;
use codegrade_common::types::{CaseOutput, ExecutionResult, Status};

#[derive(Debug, Default)]
pub struct ResultBuilder {
    failed: bool,
    outputs: Vec<CaseOutput>,
    errors: Vec<String>,
}

impl ResultBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fatal condition.
    pub fn fail(&mut self, diagnostic: impl AsRef<str>) {
        self.failed = true;
        self.errors.push(normalize_diagnostic(diagnostic.as_ref()));
    }

    /// Fold a case sequence into the result, keeping its order.
    pub fn absorb(&mut self, report: SequenceReport) {
        self.outputs.extend(report.outputs);
        self.errors
            .extend(report.diagnostics.iter().map(|d| normalize_diagnostic(d)));
        if !report.ok {
            self.failed = true;
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn finish(self) -> ExecutionResult {
        ExecutionResult {
            status: if self.failed { Status::Fail } else { Status::Pass },
            outputs: self.outputs,
            errors: self.errors,
        }
    }
}

/// CR and CRLF become LF; trailing line breaks are dropped. Everything else
/// is left for the encoder to escape.
fn normalize_diagnostic(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim_end_matches('\n')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder_passes() {
        let result = ResultBuilder::new().finish();
        assert_eq!(result.status, Status::Pass);
        assert!(result.outputs.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_fail_marks_status_and_keeps_order() {
        let mut builder = ResultBuilder::new();
        builder.absorb(SequenceReport {
            outputs: vec![vec!["1".into()]],
            diagnostics: vec![],
            ok: true,
        });
        builder.fail("first\r\n");
        builder.fail("first\r\n");
        builder.fail("second\rline");

        let result = builder.finish();
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.outputs, vec![vec!["1"]]);
        assert_eq!(result.errors, vec!["first", "first", "second\nline"]);
    }

    #[test]
    fn test_absorb_partial_progress() {
        let mut builder = ResultBuilder::new();
        builder.absorb(SequenceReport {
            outputs: vec![vec!["2".into()]],
            diagnostics: vec!["time limit exceeded in case 2 (5s)".into()],
            ok: false,
        });

        assert!(builder.is_failed());
        let result = builder.finish();
        assert_eq!(result.outputs.len(), 1);
        assert_eq!(result.errors, vec!["time limit exceeded in case 2 (5s)"]);
    }

    #[test]
    fn test_absorb_success() {
        let mut builder = ResultBuilder::new();
        builder.absorb(SequenceReport {
            outputs: vec![vec!["a".into()], vec![]],
            diagnostics: vec![],
            ok: true,
        });
        assert!(!builder.is_failed());
        assert_eq!(builder.finish().outputs.len(), 2);
    }
}
