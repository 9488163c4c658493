use crate::backend::{DEFAULT_GENAI_API, DEFAULT_OLLAMA_HOST};
use crate::error::AppError;
use crate::types::BackendKind;
use std::env;
use std::path::PathBuf;

/// Credentials for the hosted backend, read from the environment (or `.env`).
#[derive(Clone)]
pub struct HostedCredentials {
    pub api_key: String,
    pub api_endpoint: String,
}

impl std::fmt::Debug for HostedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedCredentials")
            .field("api_key", &"<redacted>")
            .field("api_endpoint", &self.api_endpoint)
            .finish()
    }
}

impl HostedCredentials {
    /// Loads `.env` if present, then reads `GENAI_KEY` and `GENAI_API`.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        Self::from_vars(env::var("GENAI_KEY").ok(), env::var("GENAI_API").ok())
    }

    fn from_vars(key: Option<String>, api: Option<String>) -> Result<Self, AppError> {
        let api_key = key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            AppError::ConfigError(
                "GENAI_KEY is not set; it is required for the hosted backend".to_string(),
            )
        })?;
        let api_endpoint = api
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GENAI_API.to_string());
        Ok(Self {
            api_key,
            api_endpoint,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub project_path: PathBuf,
    pub backend: BackendKind,
    /// Overrides the task's default model for the selected backend.
    pub model: Option<String>,
    pub temperature: f32,
    /// Glob matched against paths relative to the project root.
    pub include: Option<glob::Pattern>,
    pub ollama_host: String,
}

impl Config {
    /// Creates a new Config instance.
    ///
    /// The project path is resolved against the current working directory and must exist.
    pub fn new(
        project_path: PathBuf,
        backend: BackendKind,
        model: Option<String>,
        temperature: f32,
        include: Option<&str>,
    ) -> Result<Self, AppError> {
        let working_dir = env::current_dir().map_err(|io_err| {
            AppError::IoError(format!(
                "Failed to determine current working directory: {}",
                io_err
            ))
        })?;

        let project_path = working_dir.join(project_path);
        if !project_path.is_dir() {
            return Err(AppError::ProjectNotFound(project_path));
        }

        if !(0.0..=2.0).contains(&temperature) {
            return Err(AppError::ConfigError(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                temperature
            )));
        }

        let include = include
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|e| {
                    AppError::ConfigError(format!("Invalid include pattern '{}': {}", pattern, e))
                })
            })
            .transpose()?;

        let ollama_host = env::var("OLLAMA_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .map(|h| normalize_host(&h))
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());

        Ok(Config {
            project_path,
            backend,
            model,
            temperature,
            include,
            ollama_host,
        })
    }
}

/// `OLLAMA_HOST` is often given as `host:port` without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}
