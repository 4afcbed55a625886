use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::CommandBuilder;
use crate::config::Config;
use crate::error::{Result, RetalkError};
use crate::runner::ProcessExecutor;

/// Prepares the directories inference writes to and checks its prerequisites
pub struct SetupManager {
    config: Config,
}

/// Result of an environment check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub working_dir: PathBuf,
    pub missing_checkpoints: Vec<String>,
    /// First line of `<program> --version`, or why it could not be obtained
    pub program: std::result::Result<String, String>,
}

impl EnvironmentReport {
    pub fn is_ready(&self) -> bool {
        self.missing_checkpoints.is_empty() && self.program.is_ok()
    }
}

impl SetupManager {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Create the temp and results directories if they are absent
    pub fn prepare_directories(&self) -> Result<()> {
        let inference = &self.config.inference;

        if !inference.working_dir.is_dir() {
            return Err(RetalkError::Setup(format!(
                "Working directory does not exist: {}",
                inference.working_dir.display()
            )));
        }

        for dir in [&inference.temp_dir, &inference.results_dir] {
            let path = inference.resolve(dir);
            fs::create_dir_all(&path).map_err(|e| {
                RetalkError::Setup(format!("Failed to create {}: {}", path.display(), e))
            })?;
        }

        info!("Directories prepared under {}", inference.working_dir.display());
        Ok(())
    }

    /// Checkpoint files listed in the configuration that are not on disk
    pub fn missing_checkpoints(&self) -> Vec<String> {
        let checkpoints_dir = self.checkpoints_dir();

        self.config
            .setup
            .required_checkpoints
            .iter()
            .filter(|file| !checkpoints_dir.join(file).exists())
            .cloned()
            .collect()
    }

    /// Probe the inference program through the given executor
    pub async fn check_program(&self, executor: &dyn ProcessExecutor) -> std::result::Result<String, String> {
        let command = CommandBuilder::from_config(&self.config.inference).version_check();

        match executor.execute(&command, &self.config.inference.working_dir).await {
            Ok(output) if output.success() => {
                // Python prints its version to stderr on older releases
                let text = if output.stdout.trim().is_empty() { &output.stderr } else { &output.stdout };
                Ok(text.lines().next().unwrap_or("unknown version").trim().to_string())
            }
            Ok(output) => Err(format!(
                "{} exited with {:?}: {}",
                command,
                output.exit_code,
                output.stderr.trim()
            )),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Prepare directories, then report checkpoints and program availability
    pub async fn check_environment(&self, executor: &dyn ProcessExecutor) -> Result<EnvironmentReport> {
        self.prepare_directories()?;

        let missing_checkpoints = self.missing_checkpoints();
        for file in &missing_checkpoints {
            warn!("Missing checkpoint file: {}", file);
        }

        let program = self.check_program(executor).await;
        if let Err(reason) = &program {
            warn!("Inference program unavailable: {}", reason);
        }

        Ok(EnvironmentReport {
            working_dir: self.config.inference.working_dir.clone(),
            missing_checkpoints,
            program,
        })
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.config.inference.resolve(&self.config.setup.checkpoints_dir)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.config.inference.resolve(&self.config.inference.results_dir)
    }

    pub fn working_dir(&self) -> &Path {
        &self.config.inference.working_dir
    }
}
