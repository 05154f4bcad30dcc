// Runs a job's cases one after another against a built program.
//
// Cases go strictly in declared order so outputs line up with inputs. The
// first case that times out or fails stops the sequence; results gathered
// before it are kept.

use crate::output::extract_lines;
use crate::runner::{CaseRunner, RunOutcome};
use crate::toolchain::CommandSpec;
use codegrade_common::types::{CaseOutput, InputCase};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a sequence of runs produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
    pub outputs: Vec<CaseOutput>,
    pub diagnostics: Vec<String>,
    pub ok: bool,
}

pub struct CaseSequencer<'a> {
    runner: &'a CaseRunner,
}

impl<'a> CaseSequencer<'a> {
    pub fn new(runner: &'a CaseRunner) -> Self {
        Self { runner }
    }

    /// Run every case with the same per-case `timeout`.
    ///
    /// No cases means one run with empty stdin. That implicit run only
    /// contributes an output entry when it printed something.
    pub async fn run_all(
        &self,
        command: &CommandSpec,
        cases: &[InputCase],
        timeout: Duration,
    ) -> SequenceReport {
        let implicit = [InputCase::default()];
        let (cases, implicit_run) = if cases.is_empty() {
            (&implicit[..], true)
        } else {
            (cases, false)
        };

        let mut report = SequenceReport {
            ok: true,
            ..Default::default()
        };

        for (idx, case) in cases.iter().enumerate() {
            let case_no = idx + 1;
            debug!(case = case_no, total = cases.len(), "Executing case");

            let outcome = self
                .runner
                .run(command, &case.stdin_text(), timeout)
                .await;

            match outcome {
                Ok(RunOutcome::Completed { stdout_text, .. }) => {
                    let lines = extract_lines(&stdout_text);
                    if !(implicit_run && lines.is_empty()) {
                        report.outputs.push(lines);
                    }
                }
                Ok(RunOutcome::TimedOut) => {
                    warn!(case = case_no, "Case timed out; stopping");
                    report.diagnostics.push(format!(
                        "time limit exceeded in case {} ({}s)",
                        case_no,
                        timeout.as_secs_f64()
                    ));
                    report.ok = false;
                    break;
                }
                Ok(failed @ RunOutcome::RuntimeFailed { .. }) => {
                    warn!(case = case_no, exit = %failed.exit_description(), "Case failed; stopping");
                    report.diagnostics.push(runtime_diagnostic(case_no, &failed));
                    report.ok = false;
                    break;
                }
                Err(e) => {
                    warn!(case = case_no, error = %e, "Case could not be executed; stopping");
                    report
                        .diagnostics
                        .push(format!("runtime error in case {}: {:#}", case_no, e));
                    report.ok = false;
                    break;
                }
            }
        }

        info!(
            attempted = report.outputs.len() + usize::from(!report.ok),
            succeeded = report.outputs.len(),
            ok = report.ok,
            "Case sequence finished"
        );

        report
    }
}

fn runtime_diagnostic(case_no: usize, outcome: &RunOutcome) -> String {
    let header = format!(
        "runtime error in case {} ({})",
        case_no,
        outcome.exit_description()
    );
    match outcome {
        RunOutcome::RuntimeFailed { captured_text, .. } if !captured_text.trim().is_empty() => {
            format!("{}:\n{}", header, captured_text)
        }
        _ => header,
    }
}
