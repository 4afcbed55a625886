use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Semaphore;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::command::{CommandBuilder, generate_output_path};
use crate::config::Config;
use crate::error::{Result, RetalkError};
use crate::params::ParameterSet;
use crate::progress::ProgressReporter;
use crate::runner::{Diagnostic, JobResult, JobRunner, ProcessExecutor, SystemExecutor};

/// How a submitted job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    SilentFailure,
    HardFailure,
    /// Mandatory input missing, nothing was launched
    Invalid,
    /// Queue full, nothing was launched
    Rejected,
}

impl From<&JobResult> for JobOutcome {
    fn from(result: &JobResult) -> Self {
        match result {
            JobResult::Success(_) => JobOutcome::Succeeded,
            JobResult::SilentFailure(_) => JobOutcome::SilentFailure,
            JobResult::HardFailure(_) => JobOutcome::HardFailure,
        }
    }
}

/// Summary of one submitted job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub outcome: JobOutcome,
    pub output: Option<PathBuf>,
    pub status: String,
    pub command: Option<String>,
    pub diagnostic: Option<Diagnostic>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    fn not_launched(job_id: Uuid, started_at: DateTime<Utc>, outcome: JobOutcome, status: String) -> Self {
        Self {
            job_id,
            outcome,
            output: None,
            status,
            command: None,
            diagnostic: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == JobOutcome::Succeeded
    }

    /// (output path if any, status message)
    pub fn into_status(self) -> (Option<PathBuf>, String) {
        (self.output, self.status)
    }
}

/// Caller-facing entry point: parameters in, (output path, status) out
pub struct Workflow {
    config: Config,
    builder: CommandBuilder,
    runner: JobRunner,
    admission: Arc<Semaphore>,
    execution: Arc<Semaphore>,
}

impl Workflow {
    /// Workflow launching real processes
    pub fn new(config: Config) -> Result<Self> {
        let executor = SystemExecutor::with_timeout(config.inference.timeout());
        Self::with_executor(config, Arc::new(executor))
    }

    pub fn with_executor(config: Config, executor: Arc<dyn ProcessExecutor>) -> Result<Self> {
        config.validate()?;

        let builder = CommandBuilder::from_config(&config.inference);
        let admission = Arc::new(Semaphore::new(config.queue.max_size));
        let execution = Arc::new(Semaphore::new(config.queue.concurrency));

        Ok(Self {
            config,
            builder,
            runner: JobRunner::new(executor),
            admission,
            execution,
        })
    }

    /// Parameter set with every field at its schema default
    pub fn reset_to_defaults() -> ParameterSet {
        ParameterSet::reset()
    }

    /// Run one job and return (output path if any, status message)
    pub async fn generate(
        &self,
        params: &ParameterSet,
        progress: &dyn ProgressReporter,
    ) -> (Option<PathBuf>, String) {
        self.submit(params, progress).await.into_status()
    }

    /// Run one job and return its full report
    pub async fn submit(&self, params: &ParameterSet, progress: &dyn ProgressReporter) -> JobReport {
        let job_id = Uuid::new_v4();
        let started_at = Utc::now();

        let validated = match params.validate() {
            Ok(validated) => validated,
            Err(e) => {
                warn!("Rejected job {}: {}", job_id, e);
                return JobReport::not_launched(job_id, started_at, JobOutcome::Invalid, e.to_string());
            }
        };

        let _admitted = match self.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let e = RetalkError::QueueFull(self.config.queue.max_size);
                warn!("Rejected job {}: {}", job_id, e);
                return JobReport::not_launched(job_id, started_at, JobOutcome::Rejected, e.to_string());
            }
        };

        let inference = &self.config.inference;
        let outfile = generate_output_path(
            &inference.results_dir,
            &inference.container_ext,
            &mut rand::thread_rng(),
        );
        let command = self.builder.build(validated, &outfile);

        let span = info_span!("job", id = %job_id);
        let result = async {
            let results_dir = inference.resolve(&inference.results_dir);
            if let Err(e) = fs::create_dir_all(&results_dir).await {
                let reason = format!("Failed to create {}: {}", results_dir.display(), e);
                return JobResult::HardFailure(Diagnostic::from_error(&command, reason));
            }

            let _running = match self.execution.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    return JobResult::HardFailure(Diagnostic::from_error(&command, e.to_string()));
                }
            };
            info!("Job admitted, output will be written to {}", outfile.display());

            self.runner.run(&command, &inference.working_dir, progress).await
        }
        .instrument(span)
        .await;

        let outcome = JobOutcome::from(&result);
        let status = result.status_message();
        let diagnostic = result.diagnostic().cloned();
        let output = result.output_path().map(|path| path.to_path_buf());

        JobReport {
            job_id,
            outcome,
            output,
            status,
            command: Some(command.to_string()),
            diagnostic,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
