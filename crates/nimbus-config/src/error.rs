// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types for nimbus-config.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
///
/// Covers file loading, format detection, parsing, validation and
/// environment overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse a configuration file.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Error message.
        message: String,
        /// Line number (if available).
        line: Option<usize>,
    },

    /// Configuration validation failed.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// File I/O error.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Unsupported configuration format.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The unsupported format.
        format: String,
    },

    /// Invalid environment variable value.
    #[error("Invalid environment variable value for '{name}': {message}")]
    InvalidEnvVar {
        /// The environment variable name.
        name: String,
        /// Error message.
        message: String,
    },

    /// Serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: None,
        }
    }

    /// Creates a parse error with line number.
    pub fn parse_at_line(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        line: usize,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: Some(line),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates an invalid environment variable error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns a user-friendly error message in Korean.
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::Parse {
                path,
                message,
                line,
            } => {
                if let Some(line) = line {
                    format!(
                        "설정 파일 파싱 실패 ({}, 라인 {}): {}",
                        path.display(),
                        line,
                        message
                    )
                } else {
                    format!("설정 파일 파싱 실패 ({}): {}", path.display(), message)
                }
            }
            ConfigError::Validation { field, message } => {
                format!("설정 검증 실패 ({}): {}", field, message)
            }
            ConfigError::Io { path, .. } => {
                format!("설정 파일 읽기 실패: {}", path.display())
            }
            ConfigError::FileNotFound { path } => {
                format!("파일을 찾을 수 없습니다: {}", path.display())
            }
            ConfigError::UnsupportedFormat { format } => {
                format!("지원하지 않는 설정 형식: {}", format)
            }
            ConfigError::InvalidEnvVar { name, message } => {
                format!("잘못된 환경 변수 값 ({}): {}", name, message)
            }
            ConfigError::Serialization { message } => {
                format!("직렬화 오류: {}", message)
            }
        }
    }

    /// Returns `true` if this error is related to file I/O.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            ConfigError::Io { .. } | ConfigError::FileNotFound { .. }
        )
    }

    /// Returns the error type as a string for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ConfigError::Parse { .. } => "parse",
            ConfigError::Validation { .. } => "validation",
            ConfigError::Io { .. } => "io",
            ConfigError::FileNotFound { .. } => "file_not_found",
            ConfigError::UnsupportedFormat { .. } => "unsupported_format",
            ConfigError::InvalidEnvVar { .. } => "invalid_env_var",
            ConfigError::Serialization { .. } => "serialization",
        }
    }
}

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
