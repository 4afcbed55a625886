use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, RetalkError};

fn default_container_ext() -> String {
    "mp4".to_string()
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub inference: InferenceConfig,
    pub setup: SetupConfig,
    pub queue: QueueConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Interpreter or binary that runs inference (e.g., python)
    pub program: String,
    /// Entry script passed as the first argument
    pub script: String,
    /// Working directory of the inference process
    pub working_dir: PathBuf,
    /// Directory receiving generated videos, relative to working_dir
    pub results_dir: PathBuf,
    /// Scratch directory used by the inference program
    pub temp_dir: PathBuf,
    /// Container extension of generated videos
    #[serde(default = "default_container_ext")]
    pub container_ext: String,
    /// Kill the inference process after this many seconds (unset = wait forever)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Directory holding model checkpoints, relative to working_dir
    pub checkpoints_dir: PathBuf,
    /// Checkpoint files that must be present before inference can run
    pub required_checkpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of jobs admitted at once (running + waiting)
    pub max_size: usize,
    /// Maximum number of jobs executing at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inference: InferenceConfig {
                program: "python".to_string(),
                script: "inference.py".to_string(),
                working_dir: PathBuf::from("."),
                results_dir: PathBuf::from("results"),
                temp_dir: PathBuf::from("temp"),
                container_ext: default_container_ext(),
                timeout_secs: None,
            },
            setup: SetupConfig {
                checkpoints_dir: PathBuf::from("checkpoints"),
                required_checkpoints: [
                    "DNet.pt",
                    "LNet.pth",
                    "ENet.pth",
                    "face3d_pretrain_epoch_20.pth",
                    "GFPGANv1.3.pth",
                    "GPEN-BFR-512.pth",
                    "RetinaFace-R50.pth",
                    "shape_predictor_68_face_landmarks.dat",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            },
            queue: QueueConfig {
                max_size: 3,
                concurrency: default_concurrency(),
            },
        }
    }
}

impl InferenceConfig {
    /// Resolve a configured path against the working directory
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.working_dir.join(path)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RetalkError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| RetalkError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;

        std::fs::write(path, content)
            .map_err(|e| RetalkError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RetalkError::Config(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.inference.program.trim().is_empty() {
            return Err(RetalkError::Config("inference.program must not be empty".to_string()));
        }
        if self.inference.container_ext.trim().is_empty() {
            return Err(RetalkError::Config("inference.container_ext must not be empty".to_string()));
        }
        if self.inference.timeout_secs == Some(0) {
            return Err(RetalkError::Config(
                "inference.timeout_secs must be at least 1, omit it to wait indefinitely".to_string(),
            ));
        }
        if self.queue.max_size == 0 || self.queue.concurrency == 0 {
            return Err(RetalkError::Config(
                "queue.max_size and queue.concurrency must be at least 1".to_string(),
            ));
        }
        if self.queue.concurrency > self.queue.max_size {
            return Err(RetalkError::Config(format!(
                "queue.concurrency ({}) cannot exceed queue.max_size ({})",
                self.queue.concurrency, self.queue.max_size
            )));
        }
        Ok(())
    }
}
