use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Project not found at {}", .0.display())]
    ProjectNotFound(PathBuf),

    #[error("Analysis failed for {path:?}: {message}")]
    AnalysisError { path: PathBuf, message: String },

    #[error("{backend} backend failed: {source}")]
    BackendError {
        backend: String,
        #[source]
        source: BackendError,
    },
}

/// Errors reported by an inference backend for a single request.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The request never produced an HTTP response (connection refused, DNS, ...).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{message} (status {status})")]
    Response { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl BackendError {
    /// The backend's own error text, without status decoration.
    pub fn message(&self) -> String {
        match self {
            BackendError::Response { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
