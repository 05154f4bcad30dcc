/// Execution Engine - Top-Level Orchestration
///
/// **Responsibility:**
/// Validate a request, compile once, run every case, and assemble the final
/// `ExecutionResult`.
///
/// **Lifecycle:**
/// `Start → Compiling → {CompileFailed | Running → {AllCasesOk | CaseFailed}}`,
/// with validation failures ending in `Rejected` before anything is built.
///
/// This module is the glue layer - it knows nothing about:
/// - How a process is spawned or killed (runner's job)
/// - How a language is compiled (toolchain's job)
/// - How the result is encoded (the caller's job)
///
/// Nothing here retries. Dropping the future returned by [`ExecutionEngine::execute`]
/// kills any running child and removes the job's work directory.

use crate::compiler::Compiler;
use crate::result::ResultBuilder;
use crate::runner::CaseRunner;
use crate::sequencer::CaseSequencer;
use crate::toolchain::{Toolchain, ToolchainRegistry};
use codegrade_common::request::{self, RequestError};
use codegrade_common::settings::Settings;
use codegrade_common::types::{ExecutionResult, Job, JobRequest};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Terminal phase a job ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Rejected,
    CompileFailed,
    AllCasesOk,
    CaseFailed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Rejected => "rejected",
            Phase::CompileFailed => "compile_failed",
            Phase::AllCasesOk => "all_cases_ok",
            Phase::CaseFailed => "case_failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ExecutionEngine {
    registry: ToolchainRegistry,
    settings: Settings,
    runner: CaseRunner,
}

impl ExecutionEngine {
    pub fn new(registry: ToolchainRegistry, settings: Settings) -> Self {
        let runner = CaseRunner::new(settings.max_output_bytes);
        Self {
            registry,
            settings,
            runner,
        }
    }

    pub fn registry(&self) -> &ToolchainRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// `Start` state: turn a loosely typed request into a [`Job`] and the
    /// toolchain that will build it.
    pub fn validate(
        &self,
        request: &JobRequest,
    ) -> Result<(Job, Arc<dyn Toolchain>), RequestError> {
        let language = request::required_text(request.language.as_deref(), "language")?;
        let source = request::required_text(request.source.as_deref(), "source")?;

        let toolchain = self
            .registry
            .get(language)
            .ok_or_else(|| RequestError::InvalidLanguage(language.to_string()))?;

        if source.len() > self.settings.max_source_bytes {
            return Err(RequestError::Malformed(format!(
                "source is {} bytes, limit is {}",
                source.len(),
                self.settings.max_source_bytes
            )));
        }

        let cases = request::parse_cases(request.cases.as_ref())?;
        let timeout = request::resolve_timeout(
            request.timeout.as_ref(),
            self.settings.default_timeout,
            self.settings.max_timeout,
        );

        let job = Job {
            id: Uuid::new_v4(),
            language: language.to_string(),
            source: source.to_string(),
            timeout,
            cases,
        };

        Ok((job, toolchain))
    }

    pub async fn execute(&self, request: JobRequest) -> ExecutionResult {
        self.execute_traced(request).await.0
    }

    /// Like [`execute`](Self::execute), also reporting the terminal phase.
    pub async fn execute_traced(&self, request: JobRequest) -> (ExecutionResult, Phase) {
        match self.validate(&request) {
            Ok((job, toolchain)) => self.run_job(&job, toolchain.as_ref()).await,
            Err(e) => {
                warn!(
                    language = request.language.as_deref().unwrap_or(""),
                    error = %e,
                    "Job rejected"
                );
                (ExecutionResult::failure(e.to_string()), Phase::Rejected)
            }
        }
    }

    /// `Compiling` then `Running` for an already validated job.
    #[tracing::instrument(
        skip(self, job, toolchain),
        fields(
            job_id = %job.id,
            language = %job.language,
            case_count = job.cases.len(),
            timeout_ms = job.timeout.as_millis() as u64
        )
    )]
    pub async fn run_job(&self, job: &Job, toolchain: &dyn Toolchain) -> (ExecutionResult, Phase) {
        let job_start_time = Instant::now();
        let mut builder = ResultBuilder::new();

        info!("Starting job execution");

        let compiler = Compiler::new(&self.runner, self.settings.compile_timeout);
        let build = match compiler
            .compile(toolchain, &job.source, &self.settings.work_root)
            .await
        {
            Ok(build) => build,
            Err(e) => {
                warn!(error = %e, "Compilation failed; no cases run");
                builder.fail(e.to_string());
                return (builder.finish(), Phase::CompileFailed);
            }
        };

        let report = CaseSequencer::new(&self.runner)
            .run_all(&build.run_command, &job.cases, job.timeout)
            .await;
        builder.absorb(report);

        // work directory goes away here
        drop(build);

        let phase = if builder.is_failed() {
            Phase::CaseFailed
        } else {
            Phase::AllCasesOk
        };
        let result = builder.finish();

        info!(
            phase = %phase,
            outputs = result.outputs.len(),
            errors = result.errors.len(),
            total_execution_time_ms = job_start_time.elapsed().as_millis() as u64,
            "Completed job execution"
        );

        (result, phase)
    }
}
