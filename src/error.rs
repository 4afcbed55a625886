use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetalkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("Process execution error: {0}")]
    Process(String),

    #[error("Job queue is full ({0} jobs pending), try again later")]
    QueueFull(usize),

    #[error("Setup error: {0}")]
    Setup(String),
}

pub type Result<T> = std::result::Result<T, RetalkError>;
