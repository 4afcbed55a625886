use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{ProcessExecutor, ProcessOutput};
use crate::command::CommandSpec;
use crate::error::{Result, RetalkError};

/// Spawns the command as a real child process
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    timeout: Option<Duration>,
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child if it has not exited after `timeout`
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessExecutor for SystemExecutor {
    async fn execute(&self, command: &CommandSpec, working_dir: &Path) -> Result<ProcessOutput> {
        debug!("Spawning {} in {}", command.program(), working_dir.display());

        let mut cmd = Command::new(command.program());
        cmd.args(command.args())
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = cmd.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                RetalkError::Process(format!("timed out after {}s", limit.as_secs()))
            })?,
            None => run.await,
        }
        .map_err(|e| RetalkError::Process(format!("Failed to execute {}: {}", command.program(), e)))?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
