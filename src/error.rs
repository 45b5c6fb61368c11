use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("external dependency missing: {0}")]
    DependencyMissing(String),
    #[error("failed to write relay config: {0}")]
    ConfigWrite(String),
    #[error("failed to launch process: {0}")]
    Launch(String),
    #[error("encoder discovery failed: {0}")]
    Discovery(String),
    #[error("settings error: {0}")]
    Settings(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn validation(message: impl Display) -> Self {
        Self::Validation(message.to_string())
    }

    pub fn dependency(message: impl Display) -> Self {
        Self::DependencyMissing(message.to_string())
    }

    pub fn config_write(message: impl Display) -> Self {
        Self::ConfigWrite(message.to_string())
    }

    pub fn launch(message: impl Display) -> Self {
        Self::Launch(message.to_string())
    }

    pub fn discovery(message: impl Display) -> Self {
        Self::Discovery(message.to_string())
    }

    pub fn settings(message: impl Display) -> Self {
        Self::Settings(message.to_string())
    }

    /// Stable identifier for front ends that localize or branch on the failure.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DependencyMissing(_) => "DEPENDENCY_MISSING",
            AppError::ConfigWrite(_) => "CONFIG_WRITE_ERROR",
            AppError::Launch(_) => "LAUNCH_ERROR",
            AppError::Discovery(_) => "DISCOVERY_ERROR",
            AppError::Settings(_) | AppError::Json(_) => "SETTINGS_ERROR",
            AppError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the caller can fix its input and retry without touching the host.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}
