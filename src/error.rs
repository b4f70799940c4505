//! Unified application error types
//!
//! Provides a single error type for the service layer,
//! serializable as an `{ code, message }` response body.

use serde::Serialize;
use thiserror::Error;

use crate::screening::ScreeningError;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Screening engine error
    #[error("审核错误: {0}")]
    Screening(#[from] ScreeningError),

    /// File operation error
    #[error("文件操作错误: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("配置错误: {0}")]
    Config(String),

    /// Internal error
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Serializable error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl AppError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Error code for client-side handling
    pub fn code(&self) -> &'static str {
        match self {
            Self::Screening(ScreeningError::Validation(_)) => "VALIDATION_ERROR",
            Self::Screening(ScreeningError::InvalidPattern(_)) => "INVALID_PATTERN",
            Self::Screening(_) => "SCREENING_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Screening(e) => e.to_string(),
            Self::Io(e) => e.to_string(),
            Self::Config(msg) | Self::Internal(msg) => msg.clone(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.message(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
        }
        .serialize(serializer)
    }
}
