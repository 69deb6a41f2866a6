//! External executables as pipeline stages
//!
//! A `ProcessStage` describes one tool invocation: how to build its
//! arguments, which files it promises to produce, and how its failures map
//! onto `PipelineError`. `run_stage` executes any stage the same way:
//! output captured in full, bounded by the stage timeout, child killed if the
//! deadline passes.

use std::ffi::OsString;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::ToolConfig;
use crate::error::PipelineError;

/// Captured result of one tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl From<Output> for ProcessResult {
    fn from(output: Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Why a stage's process did not succeed
#[derive(Debug)]
pub enum StageFailure {
    /// Could not be started, or waiting on it failed
    Launch(std::io::Error),
    /// Ran and exited unsuccessfully
    Exit(ProcessResult),
}

/// Outcome of a successful stage run
#[derive(Debug)]
pub struct StageRun<O> {
    pub result: ProcessResult,
    /// Paths the tool promised to write; not checked for existence here
    pub outputs: O,
}

/// One external tool invocation
pub trait ProcessStage: Send + Sync {
    type Input: ?Sized + Sync;
    type Output;

    /// Stage name for logs and `TimedOut` errors
    fn name(&self) -> &'static str;

    fn tool(&self) -> &ToolConfig;

    fn timeout(&self) -> Duration;

    /// Contract arguments, appended after the tool's configured prefix args
    fn build_args(&self, input: &Self::Input) -> Vec<OsString>;

    /// Paths the tool is expected to produce for `input`
    fn declared_outputs(&self, input: &Self::Input) -> Self::Output;

    fn failure(&self, failure: StageFailure) -> PipelineError;
}

/// Run `stage` against `input`
///
/// Non-zero exit, launch errors and timeouts all become errors; stdout and
/// stderr never influence the outcome.
pub async fn run_stage<S>(stage: &S, input: &S::Input) -> Result<StageRun<S::Output>, PipelineError>
where
    S: ProcessStage,
{
    let tool = stage.tool();
    let args = stage.build_args(input);
    let timeout = stage.timeout();

    let mut command = Command::new(&tool.program);
    command
        .args(&tool.args)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!(
        stage = stage.name(),
        program = %tool.program,
        args = ?args,
        timeout_secs = timeout.as_secs(),
        "Launching external tool"
    );

    let started = Instant::now();
    let child = command.spawn().map_err(|e| {
        error!(stage = stage.name(), program = %tool.program, error = %e, "Failed to launch tool");
        stage.failure(StageFailure::Launch(e))
    })?;

    // Dropping the wait future on timeout drops the child, which kills it
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(stage.failure(StageFailure::Launch(e))),
        Err(_) => {
            error!(
                stage = stage.name(),
                timeout_secs = timeout.as_secs(),
                "External tool timed out; killed"
            );
            return Err(PipelineError::TimedOut {
                stage: stage.name(),
                timeout,
            });
        }
    };

    let result = ProcessResult::from(output);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    debug!(stage = stage.name(), stdout = %result.stdout, "Tool stdout");
    debug!(stage = stage.name(), stderr = %result.stderr, "Tool stderr");

    if !result.success() {
        error!(
            stage = stage.name(),
            exit_code = ?result.exit_code,
            elapsed_ms,
            "External tool failed"
        );
        return Err(stage.failure(StageFailure::Exit(result)));
    }

    info!(stage = stage.name(), elapsed_ms, "External tool finished");

    Ok(StageRun {
        result,
        outputs: stage.declared_outputs(input),
    })
}
