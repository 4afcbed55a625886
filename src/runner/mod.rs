// Job execution
//
// - Executor: the narrow seam to the external inference program
// - Job: runs one command, reports milestones, classifies the outcome

pub mod executor;
pub mod job;

use async_trait::async_trait;
use std::path::Path;

pub use executor::*;
pub use job::*;

use crate::command::CommandSpec;
use crate::error::Result;

/// Captured result of one process run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, absent when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a command to completion and captures its output.
///
/// An `Err` means the process could not be launched or awaited at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn execute(&self, command: &CommandSpec, working_dir: &Path) -> Result<ProcessOutput>;
}
