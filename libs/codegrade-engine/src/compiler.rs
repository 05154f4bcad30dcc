/// Compiler - Compile Once Before Any Case Runs
///
/// **Responsibility:**
/// Materialize the source in a private work directory, run the toolchain's
/// compile step (if it has one), and hand back the command every case runs.
///
/// **Rules:**
/// - Interpreted toolchains skip compilation entirely
/// - Any compile failure (non-zero exit, timeout, missing compiler) is fatal
/// - A run command that needs a name produced by compilation gets it from the
///   artifacts on disk; failing to resolve it is a compile failure

use crate::runner::{CaseRunner, RunOutcome};
use crate::toolchain::{BuildPaths, CommandSpec, Toolchain};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Display text is the diagnostic reported for the job.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("compilation failed:\n{0}")]
    Failed(String),
    #[error("compilation failed: compiler exceeded {0}s")]
    TimedOut(f64),
    #[error("compilation failed: {0}")]
    EntryPoint(String),
    #[error("compilation failed: {0}")]
    Setup(String),
}

/// A compiled (or ready-to-interpret) program. Owns the work directory,
/// which is removed when this is dropped.
#[derive(Debug)]
pub struct Build {
    workdir: TempDir,
    pub run_command: CommandSpec,
}

impl Build {
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }
}

pub struct Compiler<'a> {
    runner: &'a CaseRunner,
    compile_timeout: Duration,
}

impl<'a> Compiler<'a> {
    pub fn new(runner: &'a CaseRunner, compile_timeout: Duration) -> Self {
        Self {
            runner,
            compile_timeout,
        }
    }

    #[tracing::instrument(skip(self, toolchain, source, work_root), fields(language = %toolchain.language()))]
    pub async fn compile(
        &self,
        toolchain: &dyn Toolchain,
        source: &str,
        work_root: &Path,
    ) -> Result<Build, CompileError> {
        let workdir = create_workdir(work_root)?;
        let paths = BuildPaths::new(workdir.path(), &toolchain.source_file_name());

        tokio::fs::write(&paths.source, source)
            .await
            .map_err(|e| CompileError::Setup(format!("could not write source file ({})", e)))?;

        let Some(compile_command) = toolchain.compile_command(&paths) else {
            return Ok(Build {
                run_command: toolchain.run_command(&paths, None),
                workdir,
            });
        };

        debug!(command = %compile_command.display(), "Compiling");
        let start_time = Instant::now();
        let outcome = self
            .runner
            .run(&compile_command, "", self.compile_timeout)
            .await
            .map_err(|e| CompileError::Setup(format!("{:#}", e)))?;
        let compilation_time_ms = start_time.elapsed().as_millis() as u64;

        match outcome {
            RunOutcome::Completed { .. } => {
                info!(compilation_time_ms = compilation_time_ms, "Compilation succeeded");
            }
            RunOutcome::TimedOut => {
                warn!(compilation_time_ms = compilation_time_ms, "Compilation timed out");
                return Err(CompileError::TimedOut(self.compile_timeout.as_secs_f64()));
            }
            RunOutcome::RuntimeFailed { captured_text, .. } => {
                warn!(
                    compilation_time_ms = compilation_time_ms,
                    error_preview = captured_text.lines().next().unwrap_or(""),
                    "Compilation failed"
                );
                return Err(CompileError::Failed(captured_text));
            }
        }

        let entry = match toolchain.entry_artifact_extension() {
            Some(extension) => {
                Some(resolve_entry_point(&paths.workdir, extension, &paths.source_stem()).await?)
            }
            None => None,
        };

        Ok(Build {
            run_command: toolchain.run_command(&paths, entry.as_deref()),
            workdir,
        })
    }
}

fn create_workdir(work_root: &Path) -> Result<TempDir, CompileError> {
    std::fs::create_dir_all(work_root)
        .and_then(|_| {
            tempfile::Builder::new()
                .prefix("codegrade-")
                .tempdir_in(work_root)
        })
        .map_err(|e| {
            CompileError::Setup(format!(
                "could not create work directory in {} ({})",
                work_root.display(),
                e
            ))
        })
}

/// Find the entry point among compiled artifacts.
///
/// Nested artifacts (`Outer$Inner.class`) are ignored. One candidate wins
/// outright; with several, the one named after the source file wins.
async fn resolve_entry_point(
    workdir: &Path,
    extension: &str,
    source_stem: &str,
) -> Result<String, CompileError> {
    let mut entries = tokio::fs::read_dir(workdir)
        .await
        .map_err(|e| CompileError::EntryPoint(format!("could not list build artifacts ({})", e)))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CompileError::EntryPoint(format!("could not list build artifacts ({})", e)))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if !stem.contains('$') {
                candidates.push(stem.to_string());
            }
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(CompileError::EntryPoint(format!(
            "no .{} artifact produced; cannot determine entry point",
            extension
        ))),
        1 => Ok(candidates.remove(0)),
        _ if candidates.iter().any(|c| c == source_stem) => Ok(source_stem.to_string()),
        _ => Err(CompileError::EntryPoint(format!(
            "ambiguous entry point, found: {}",
            candidates.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn touch(dir: &Path, name: &str) {
        tokio::fs::write(dir.join(name), b"").await.unwrap();
    }

    #[tokio::test]
    async fn test_single_artifact_is_the_entry_point() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Solution.class").await;
        touch(dir.path(), "Solution$Node.class").await;
        touch(dir.path(), "Main.java").await;

        let entry = resolve_entry_point(dir.path(), "class", "Main").await.unwrap();
        assert_eq!(entry, "Solution");
    }

    #[tokio::test]
    async fn test_source_stem_breaks_ties() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Helper.class").await;
        touch(dir.path(), "Main.class").await;

        let entry = resolve_entry_point(dir.path(), "class", "Main").await.unwrap();
        assert_eq!(entry, "Main");
    }

    #[tokio::test]
    async fn test_unresolvable_entry_point_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_entry_point(dir.path(), "class", "Main").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "compilation failed: no .class artifact produced; cannot determine entry point"
        );

        touch(dir.path(), "A.class").await;
        touch(dir.path(), "B.class").await;
        let err = resolve_entry_point(dir.path(), "class", "Main").await.unwrap_err();
        assert!(matches!(err, CompileError::EntryPoint(ref m) if m.contains("A, B")));
    }

    #[test]
    fn test_workdirs_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let a = create_workdir(root.path()).unwrap();
        let b = create_workdir(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(root.path()));
    }
}
