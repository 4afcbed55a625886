use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{ProcessExecutor, ProcessOutput};
use crate::command::CommandSpec;
use crate::progress::ProgressReporter;

pub const PROGRESS_STARTING: f32 = 0.1;
pub const PROGRESS_FINALIZING: f32 = 0.9;
pub const PROGRESS_COMPLETE: f32 = 1.0;

pub const STATUS_SUCCESS: &str = "Video processing completed successfully!";

/// Lifecycle of one job. The last three states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    NotStarted,
    Running,
    Succeeded,
    SilentFailure,
    HardFailure,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::SilentFailure | JobState::HardFailure
        )
    }
}

/// Everything needed to diagnose a failed job without re-running it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Launch or wait error, when the process never produced an exit status
    pub reason: Option<String>,
}

impl Diagnostic {
    pub fn from_output(command: &CommandSpec, output: &ProcessOutput) -> Self {
        Self {
            command: command.to_string(),
            exit_code: output.exit_code,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            reason: None,
        }
    }

    pub fn from_error(command: &CommandSpec, reason: String) -> Self {
        Self {
            command: command.to_string(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            reason: Some(reason),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.reason {
            writeln!(f, "Exception occurred: {}", reason)?;
        }
        writeln!(f, "Command: {}", self.command)?;
        match self.exit_code {
            Some(code) => writeln!(f, "Return code: {}", code)?,
            None => writeln!(f, "Return code: none")?,
        }
        writeln!(f, "Stdout: {}", self.stdout)?;
        write!(f, "Stderr: {}", self.stderr)
    }
}

/// Outcome of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    /// Process exited 0 and the output file exists
    Success(PathBuf),
    /// Process exited 0 but never wrote the output file
    SilentFailure(Diagnostic),
    /// Non-zero exit, signal, or launch error
    HardFailure(Diagnostic),
}

impl JobResult {
    pub fn state(&self) -> JobState {
        match self {
            JobResult::Success(_) => JobState::Succeeded,
            JobResult::SilentFailure(_) => JobState::SilentFailure,
            JobResult::HardFailure(_) => JobState::HardFailure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success(_))
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            JobResult::Success(path) => Some(path),
            _ => None,
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            JobResult::Success(_) => None,
            JobResult::SilentFailure(diagnostic) | JobResult::HardFailure(diagnostic) => {
                Some(diagnostic)
            }
        }
    }

    /// Human-readable status line(s) for the caller
    pub fn status_message(&self) -> String {
        match self {
            JobResult::Success(_) => STATUS_SUCCESS.to_string(),
            JobResult::SilentFailure(diagnostic) => format!(
                "Processing completed but output file not found.\n{}",
                diagnostic
            ),
            JobResult::HardFailure(diagnostic) => {
                format!("Error processing video:\n{}", diagnostic)
            }
        }
    }

    /// (output path if any, status message)
    pub fn into_status(self) -> (Option<PathBuf>, String) {
        let message = self.status_message();
        match self {
            JobResult::Success(path) => (Some(path), message),
            _ => (None, message),
        }
    }
}

/// Runs exactly one command per call and classifies the outcome.
///
/// Never retries. Captured output is passed through untouched.
#[derive(Clone)]
pub struct JobRunner {
    executor: Arc<dyn ProcessExecutor>,
}

impl JobRunner {
    pub fn new(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self { executor }
    }

    pub async fn run(
        &self,
        command: &CommandSpec,
        working_dir: &Path,
        progress: &dyn ProgressReporter,
    ) -> JobResult {
        progress.report(PROGRESS_STARTING, "Starting video processing...");
        info!("Running command: {}", command);

        let output = match self.executor.execute(command, working_dir).await {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to run inference: {}", e);
                return JobResult::HardFailure(Diagnostic::from_error(command, e.to_string()));
            }
        };

        progress.report(PROGRESS_FINALIZING, "Finalizing output...");
        debug!("Inference stdout: {}", output.stdout);
        debug!("Inference stderr: {}", output.stderr);

        if !output.success() {
            let diagnostic = Diagnostic::from_output(command, &output);
            error!("Inference failed:\n{}", diagnostic);
            return JobResult::HardFailure(diagnostic);
        }

        let Some(outfile) = command.outfile() else {
            warn!("No output path recorded for {}", command);
            return JobResult::SilentFailure(Diagnostic::from_output(command, &output));
        };

        let produced = working_dir.join(outfile);
        match tokio::fs::try_exists(&produced).await {
            Ok(true) => {
                progress.report(PROGRESS_COMPLETE, "Processing complete!");
                info!("Inference completed: {}", produced.display());
                JobResult::Success(produced)
            }
            Ok(false) | Err(_) => {
                warn!(
                    "Inference exited successfully but {} was not created",
                    produced.display()
                );
                JobResult::SilentFailure(Diagnostic::from_output(command, &output))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandBuilder;
    use crate::error::RetalkError;
    use crate::params::ParameterSet;
    use crate::runner::MockProcessExecutor;
    use std::sync::Mutex;

    const OUTFILE: &str = "results/output_54321.mp4";

    fn command() -> CommandSpec {
        let params = ParameterSet::new("a.mp4", "b.wav");
        CommandBuilder::new("python", "inference.py")
            .build(params.validate().unwrap(), Path::new(OUTFILE))
    }

    fn exited(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    async fn run_with(executor: MockProcessExecutor, working_dir: &Path) -> (JobResult, Vec<f32>) {
        let events = Mutex::new(Vec::new());
        let reporter = |fraction: f32, _description: &str| {
            events.lock().unwrap().push(fraction);
        };

        let runner = JobRunner::new(Arc::new(executor));
        let result = runner.run(&command(), working_dir, &reporter).await;
        (result, events.into_inner().unwrap())
    }

    #[tokio::test]
    async fn test_success_when_output_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("results")).unwrap();

        let mut executor = MockProcessExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .returning(|command, working_dir| {
                std::fs::write(working_dir.join(command.outfile().unwrap()), b"video").unwrap();
                Ok(exited(0, "done", ""))
            });

        let (result, events) = run_with(executor, dir.path()).await;
        assert_eq!(result, JobResult::Success(dir.path().join(OUTFILE)));
        assert_eq!(events, vec![PROGRESS_STARTING, PROGRESS_FINALIZING, PROGRESS_COMPLETE]);
        assert_eq!(result.state(), JobState::Succeeded);
        assert_eq!(result.into_status().1, STATUS_SUCCESS);
    }

    #[tokio::test]
    async fn test_silent_failure_when_output_missing() {
        let dir = tempfile::tempdir().unwrap();

        let mut executor = MockProcessExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .returning(|_, _| Ok(exited(0, "all frames written", "warning: no face")));

        let (result, events) = run_with(executor, dir.path()).await;
        assert_eq!(result.state(), JobState::SilentFailure);
        assert_eq!(events, vec![PROGRESS_STARTING, PROGRESS_FINALIZING]);

        let (path, status) = result.into_status();
        assert!(path.is_none());
        assert!(status.contains("output file not found"));
        assert!(status.contains("all frames written"));
        assert!(status.contains("warning: no face"));
        assert!(status.contains("--outfile results/output_54321.mp4"));
    }

    #[tokio::test]
    async fn test_hard_failure_on_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();

        let mut executor = MockProcessExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .returning(|_, _| Ok(exited(1, "loading models", "CUDA out of memory")));

        let (result, events) = run_with(executor, dir.path()).await;
        assert_eq!(events, vec![PROGRESS_STARTING, PROGRESS_FINALIZING]);

        let diagnostic = result.diagnostic().unwrap().clone();
        assert_eq!(result.state(), JobState::HardFailure);
        assert_eq!(diagnostic.exit_code, Some(1));
        assert_eq!(diagnostic.stdout, "loading models");
        assert_eq!(diagnostic.stderr, "CUDA out of memory");

        let status = result.status_message();
        assert!(status.contains("Return code: 1"));
        assert!(status.contains("Command: python inference.py --face a.mp4"));
    }

    #[tokio::test]
    async fn test_hard_failure_on_launch_error() {
        let dir = tempfile::tempdir().unwrap();

        let mut executor = MockProcessExecutor::new();
        executor.expect_execute().times(1).returning(|_, _| {
            Err(RetalkError::Process("Failed to execute python: No such file".to_string()))
        });

        let (result, events) = run_with(executor, dir.path()).await;
        assert_eq!(events, vec![PROGRESS_STARTING]);

        let diagnostic = result.diagnostic().unwrap();
        assert_eq!(diagnostic.exit_code, None);
        assert!(result.status_message().contains("Exception occurred"));
        assert!(result.status_message().contains("No such file"));
    }

    #[tokio::test]
    async fn test_signal_termination_is_hard_failure() {
        let dir = tempfile::tempdir().unwrap();

        let mut executor = MockProcessExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .returning(|_, _| Ok(ProcessOutput::default()));

        let (result, _) = run_with(executor, dir.path()).await;
        assert_eq!(result.state(), JobState::HardFailure);
        assert!(result.status_message().contains("Return code: none"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::NotStarted.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::SilentFailure.is_terminal());
        assert!(JobState::HardFailure.is_terminal());
    }
}
