/// Case Runner - One Program Invocation Under a Deadline
///
/// **Core Responsibility:**
/// Spawn one process, feed it stdin, capture stdout/stderr, and classify how
/// it ended.
///
/// **Guarantees:**
/// - Hard deadline: enforced via `tokio::time::timeout`; on expiry the whole
///   process group is SIGKILLed and no partial output is reported
/// - Guaranteed cleanup: the process group is killed when the direct child
///   exits, when the deadline fires, and when the run is dropped mid-flight
/// - No deadlocks: stdin is written while stdout/stderr are drained
/// - Exit status wins: once the program exits, output collection gets a short
///   grace period, so a descendant that escaped the group cannot hold the
///   result hostage
/// - Bounded memory: each stream keeps at most `max_output_bytes`

use crate::toolchain::CommandSpec;
use anyhow::{Context, Result};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// How long output pipes may stay open after the program itself exited.
const PIPE_EOF_GRACE: Duration = Duration::from_millis(250);

/// How one invocation ended. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        stdout_text: String,
        exit_code: i32,
    },
    TimedOut,
    RuntimeFailed {
        captured_text: String,
        exit_code: Option<i32>,
        signal: Option<i32>,
    },
}

impl RunOutcome {
    /// Short human description of a failed exit, e.g. `exit code 1`.
    pub fn exit_description(&self) -> String {
        match self {
            RunOutcome::Completed { exit_code, .. } => format!("exit code {}", exit_code),
            RunOutcome::TimedOut => "timed out".to_string(),
            RunOutcome::RuntimeFailed {
                exit_code: Some(code),
                ..
            } => format!("exit code {}", code),
            RunOutcome::RuntimeFailed {
                signal: Some(signal),
                ..
            } => describe_signal(*signal),
            RunOutcome::RuntimeFailed { .. } => "abnormal termination".to_string(),
        }
    }
}

fn describe_signal(signal: i32) -> String {
    let name = Signal::try_from(signal)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("signal {}", signal));

    match Signal::try_from(signal) {
        Ok(Signal::SIGKILL) => format!("killed by {}: likely exceeded memory limit", name),
        Ok(Signal::SIGSEGV) => format!("killed by {}: segmentation fault", name),
        _ => format!("killed by {}", name),
    }
}

/// Kills the child's process group when dropped.
///
/// The child is spawned as the leader of a fresh group, so the group id is
/// its pid and covers every descendant that did not detach itself.
struct ProcessGroupGuard {
    pgid: Option<Pid>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|pid| i32::try_from(pid).ok()).map(Pid::from_raw),
        }
    }

    /// Kill the group once. Later calls do nothing, so a group id that was
    /// released and handed to someone else is never signalled.
    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            // ESRCH just means the group is already gone
            let _ = killpg(pgid, Signal::SIGKILL);
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[derive(Debug, Clone)]
pub struct CaseRunner {
    max_output_bytes: usize,
}

impl Default for CaseRunner {
    fn default() -> Self {
        Self::new(8 * 1024 * 1024)
    }
}

impl CaseRunner {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    /// Run `command` once with `stdin_text` on its input.
    ///
    /// `Err` is reserved for infrastructure failures (the program could not
    /// be started or its pipes failed); everything the program itself does is
    /// an `Ok(RunOutcome)`.
    pub async fn run(
        &self,
        command: &CommandSpec,
        stdin_text: &str,
        deadline: Duration,
    ) -> Result<RunOutcome> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start `{}`", command.program))?;

        let mut group = ProcessGroupGuard::new(child.id());
        let start_time = Instant::now();

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let input = stdin_payload(stdin_text);
        let limit = self.max_output_bytes;
        let mut out = Vec::new();
        let mut err = Vec::new();

        let execution = async {
            let feed = async move {
                if let Some(mut pipe) = stdin {
                    if !input.is_empty() {
                        // The program may exit without reading; a broken pipe is fine.
                        if let Err(e) = pipe.write_all(input.as_bytes()).await {
                            debug!(error = %e, "stdin not fully consumed");
                        }
                    }
                }
            };
            let streams = async {
                let (_, out_read, err_read) = tokio::join!(
                    feed,
                    drain(stdout, &mut out, limit),
                    drain(stderr, &mut err, limit)
                );
                out_read.and(err_read)
            };
            tokio::pin!(streams);

            let (status, drained) = tokio::select! {
                status = child.wait() => (status?, false),
                read = &mut streams => {
                    read?;
                    (child.wait().await?, true)
                }
            };
            // Reap stragglers so inherited pipes reach EOF.
            group.kill();

            if !drained {
                match tokio::time::timeout(PIPE_EOF_GRACE, &mut streams).await {
                    Ok(read) => read?,
                    Err(_) => warn!(
                        program = %command.program,
                        grace_ms = PIPE_EOF_GRACE.as_millis() as u64,
                        "Output still held open by a process that left the group; it was left running"
                    ),
                }
            }

            Ok::<_, std::io::Error>(status)
        };

        let timeout_result = tokio::time::timeout(deadline, execution).await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        let status = match timeout_result {
            Ok(collected) => collected.context("failed to collect program output")?,
            Err(_) => {
                group.kill();
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to reap timed-out process");
                }
                warn!(
                    program = %command.program,
                    elapsed_ms = elapsed_ms,
                    deadline_ms = deadline.as_millis() as u64,
                    "Execution timed out"
                );
                return Ok(RunOutcome::TimedOut);
            }
        };

        let stdout_text = String::from_utf8_lossy(&out).into_owned();

        if status.success() {
            debug!(program = %command.program, elapsed_ms = elapsed_ms, "Execution completed");
            return Ok(RunOutcome::Completed {
                stdout_text,
                exit_code: 0,
            });
        }

        let stderr_text = String::from_utf8_lossy(&err);
        debug!(
            program = %command.program,
            elapsed_ms = elapsed_ms,
            exit_code = ?status.code(),
            signal = ?status.signal(),
            "Execution failed"
        );

        Ok(RunOutcome::RuntimeFailed {
            captured_text: combine_streams(&stdout_text, &stderr_text),
            exit_code: status.code(),
            signal: status.signal(),
        })
    }
}

/// Line-oriented programs expect a terminated last line.
fn stdin_payload(stdin_text: &str) -> String {
    if stdin_text.is_empty() || stdin_text.ends_with('\n') {
        stdin_text.to_string()
    } else {
        format!("{}\n", stdin_text)
    }
}

/// Read a pipe to EOF into `captured`, keeping at most `limit` bytes. The
/// rest is still read so the writer never blocks on a full pipe. Bytes read
/// so far stay in `captured` if this is cancelled.
async fn drain<R>(pipe: Option<R>, captured: &mut Vec<u8>, limit: usize) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(());
    };

    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let room = limit.saturating_sub(captured.len());
        captured.extend_from_slice(&chunk[..n.min(room)]);
    }
}

fn combine_streams(stdout: &str, stderr: &str) -> String {
    let mut text = stdout.to_string();
    if !text.is_empty() && !stderr.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(stderr);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            cwd: std::env::temp_dir(),
        }
    }

    #[test]
    fn test_stdin_payload_terminates_last_line() {
        assert_eq!(stdin_payload(""), "");
        assert_eq!(stdin_payload("1\n2"), "1\n2\n");
        assert_eq!(stdin_payload("1\n"), "1\n");
    }

    #[test]
    fn test_combine_streams() {
        assert_eq!(combine_streams("out", "err"), "out\nerr");
        assert_eq!(combine_streams("out\n", "err"), "out\nerr");
        assert_eq!(combine_streams("", "err"), "err");
        assert_eq!(combine_streams("out", ""), "out");
    }

    #[test]
    fn test_exit_descriptions() {
        let failed = |exit_code, signal| RunOutcome::RuntimeFailed {
            captured_text: String::new(),
            exit_code,
            signal,
        };
        assert_eq!(failed(Some(3), None).exit_description(), "exit code 3");
        assert_eq!(
            failed(None, Some(11)).exit_description(),
            "killed by SIGSEGV: segmentation fault"
        );
        assert!(failed(None, Some(9)).exit_description().contains("memory limit"));
    }

    #[tokio::test]
    async fn test_completed_keeps_stdout_only() {
        let outcome = CaseRunner::default()
            .run(&sh("echo out; echo err >&2"), "", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                stdout_text: "out\n".into(),
                exit_code: 0
            }
        );
    }

    #[tokio::test]
    async fn test_stdin_is_fed_with_terminator() {
        let outcome = CaseRunner::default()
            .run(&sh("read a; read b; echo $((a + b))"), "10\n20", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                stdout_text: "30\n".into(),
                exit_code: 0
            }
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_runtime_failure() {
        let outcome = CaseRunner::default()
            .run(&sh("echo partial; echo boom >&2; exit 3"), "", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::RuntimeFailed {
                captured_text: "partial\nboom\n".into(),
                exit_code: Some(3),
                signal: None
            }
        );
    }

    #[tokio::test]
    async fn test_signal_death_is_runtime_failure() {
        let outcome = CaseRunner::default()
            .run(&sh("kill -9 $$"), "", Duration::from_secs(5))
            .await
            .unwrap();
        match outcome {
            RunOutcome::RuntimeFailed {
                exit_code, signal, ..
            } => {
                assert_eq!(exit_code, None);
                assert_eq!(signal, Some(9));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hang_times_out_near_deadline() {
        let start = Instant::now();
        let outcome = CaseRunner::default()
            .run(&sh("while true; do :; done"), "", Duration::from_millis(500))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcome, RunOutcome::TimedOut);
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_background_descendant_does_not_stall_collection() {
        let start = Instant::now();
        let outcome = CaseRunner::default()
            .run(&sh("sleep 30 & echo done"), "", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed {
                stdout_text: "done\n".into(),
                exit_code: 0
            }
        );
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_detached_descendant_does_not_turn_exit_into_timeout() {
        let start = Instant::now();
        let outcome = CaseRunner::default()
            .run(&sh("setsid sleep 6 & echo done"), "", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed {
                stdout_text: "done\n".into(),
                exit_code: 0
            }
        );
        assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let outcome = CaseRunner::default()
            .run(&sh(r"printf 'a\377b\n'"), "", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                stdout_text: "a\u{FFFD}b\n".into(),
                exit_code: 0
            }
        );
    }

    #[tokio::test]
    async fn test_group_guard_disarms_after_kill() {
        let mut child = Command::new("sleep")
            .arg("5")
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let mut guard = ProcessGroupGuard::new(child.id());
        assert!(guard.pgid.is_some());

        guard.kill();
        assert!(guard.pgid.is_none());
        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(9));

        // reaped; a second kill must not signal a recycled group id
        guard.kill();
        assert!(guard.pgid.is_none());
    }

    #[tokio::test]
    async fn test_unread_large_input_is_not_an_error() {
        let input = "x".repeat(1024 * 1024);
        let outcome = CaseRunner::default()
            .run(&sh("echo ignored"), &input, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let outcome = CaseRunner::new(10)
            .run(&sh("printf '0123456789abcdef'"), "", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                stdout_text: "0123456789".into(),
                exit_code: 0
            }
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let command = CommandSpec {
            program: "/definitely/not/a/program".into(),
            args: vec![],
            cwd: PathBuf::from("/"),
        };
        let err = CaseRunner::default()
            .run(&command, "", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
