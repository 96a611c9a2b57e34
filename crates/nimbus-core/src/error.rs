// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error hierarchy for NIMBUS.
//!
//! This module defines a comprehensive error type system that:
//!
//! - Provides clear, descriptive error messages
//! - Supports error chaining for traceability
//! - Distinguishes between retryable and non-retryable errors
//! - Supports structured logging
//!
//! # Error Hierarchy
//!
//! ```text
//! NimbusError (root)
//! ├── CodecError      - Template message rendering and parsing
//! ├── AggregateError  - Aggregation pipeline
//! ├── SourceError     - Local historical store access
//! ├── TagError        - Tag reads and typed writes
//! ├── ControlError    - Device restart and firmware staging
//! ├── SettingsError   - Persisted settings access
//! ├── FirmwareError   - Firmware image retrieval
//! └── LinkError       - Cloud transport and provisioning
//! ```
//!
//! # Examples
//!
//! ```
//! use nimbus_core::error::{LinkError, NimbusError};
//!
//! let error = LinkError::connection_failed("broker unreachable");
//! assert!(error.is_retryable());
//!
//! let root: NimbusError = error.into();
//! assert!(root.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// NimbusError - Root Error Type
// =============================================================================

/// The root error type for NIMBUS.
///
/// All errors in NIMBUS can be converted to this type, providing a unified
/// error handling interface across the entire system.
#[derive(Debug, Error)]
pub enum NimbusError {
    /// Template codec error.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Aggregation pipeline error.
    #[error("Aggregation error: {0}")]
    Aggregate(#[from] AggregateError),

    /// Historical store error.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Tag access error.
    #[error("Tag error: {0}")]
    Tag(#[from] TagError),

    /// Device control error.
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// Persisted settings error.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Firmware retrieval error.
    #[error("Firmware error: {0}")]
    Firmware(#[from] FirmwareError),

    /// Cloud link error.
    #[error("Link error: {0}")]
    Link(#[from] LinkError),
}

impl NimbusError {
    /// Returns `true` if this error is retryable.
    ///
    /// Retryable errors are typically transient issues that may succeed
    /// on a subsequent attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            NimbusError::Source(e) => e.is_retryable(),
            NimbusError::Firmware(e) => e.is_retryable(),
            NimbusError::Link(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns a user-friendly error message.
    ///
    /// This message is suitable for display to operators and avoids
    /// exposing internal implementation details.
    pub fn user_message(&self) -> String {
        match self {
            NimbusError::Codec(e) => format!("메시지 처리 오류: {}", e.user_message()),
            NimbusError::Aggregate(e) => format!("집계 오류: {}", e.user_message()),
            NimbusError::Source(e) => format!("로컬 저장소 오류: {}", e.user_message()),
            NimbusError::Tag(e) => format!("태그 접근 오류: {}", e.user_message()),
            NimbusError::Control(e) => format!("장비 제어 오류: {}", e.user_message()),
            NimbusError::Settings(e) => format!("설정 저장 오류: {}", e.user_message()),
            NimbusError::Firmware(e) => format!("펌웨어 오류: {}", e.user_message()),
            NimbusError::Link(e) => format!("클라우드 연결 오류: {}", e.user_message()),
        }
    }

    /// Returns the error type as a string for logging/metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            NimbusError::Codec(_) => "codec",
            NimbusError::Aggregate(_) => "aggregate",
            NimbusError::Source(_) => "source",
            NimbusError::Tag(_) => "tag",
            NimbusError::Control(_) => "control",
            NimbusError::Settings(_) => "settings",
            NimbusError::Firmware(_) => "firmware",
            NimbusError::Link(_) => "link",
        }
    }
}

// =============================================================================
// CodecError
// =============================================================================

/// Template codec errors.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The payload does not match its template's field layout.
    #[error("Malformed template message: {message}")]
    Format {
        /// Error message.
        message: String,
    },

    /// The leading template id is not one this gateway handles.
    #[error("Unknown template id '{id}'")]
    UnknownTemplate {
        /// The unrecognized id field.
        id: String,
    },

    /// A field failed to parse as its expected type.
    #[error("Invalid value for '{field}': {message}")]
    InvalidField {
        /// The offending field.
        field: String,
        /// Error message.
        message: String,
    },
}

impl CodecError {
    /// Creates a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Creates an unknown-template error.
    pub fn unknown_template(id: impl Into<String>) -> Self {
        Self::UnknownTemplate { id: id.into() }
    }

    /// Creates an invalid-field error.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            CodecError::Format { message } => {
                format!("메시지 형식이 올바르지 않습니다: {}", message)
            }
            CodecError::UnknownTemplate { id } => {
                format!("지원하지 않는 템플릿입니다: {}", id)
            }
            CodecError::InvalidField { field, message } => {
                format!("필드 값이 유효하지 않습니다 ({}): {}", field, message)
            }
        }
    }
}

// =============================================================================
// AggregateError
// =============================================================================

/// Aggregation pipeline errors.
#[derive(Debug, Clone, Error)]
pub enum AggregateError {
    /// Unknown aggregation policy name.
    #[error("Invalid aggregation policy '{value}'")]
    InvalidPolicy {
        /// The unrecognized policy name.
        value: String,
    },

    /// The reporting period is not usable.
    #[error("Invalid aggregation window: {message}")]
    InvalidWindow {
        /// Error message.
        message: String,
    },
}

impl AggregateError {
    /// Creates an invalid-policy error.
    pub fn invalid_policy(value: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            value: value.into(),
        }
    }

    /// Creates an invalid-window error.
    pub fn invalid_window(message: impl Into<String>) -> Self {
        Self::InvalidWindow {
            message: message.into(),
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            AggregateError::InvalidPolicy { value } => {
                format!("알 수 없는 집계 정책입니다: {}", value)
            }
            AggregateError::InvalidWindow { message } => {
                format!("집계 주기가 유효하지 않습니다: {}", message)
            }
        }
    }
}

// =============================================================================
// SourceError
// =============================================================================

/// Historical store access errors.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The store rejected or failed a pull.
    #[error("Pull failed: {message}")]
    Pull {
        /// Error message.
        message: String,
    },

    /// The cursor no longer identifies a valid position.
    #[error("Cursor invalid: {message}")]
    CursorInvalid {
        /// Error message.
        message: String,
    },

    /// The store is not reachable right now.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },
}

impl SourceError {
    /// Creates a pull error.
    pub fn pull(message: impl Into<String>) -> Self {
        Self::Pull {
            message: message.into(),
        }
    }

    /// Creates a cursor-invalid error.
    pub fn cursor_invalid(message: impl Into<String>) -> Self {
        Self::CursorInvalid {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Cursor loss is not: the caller must open a fresh cursor first.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::CursorInvalid { .. })
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            SourceError::Pull { message } => {
                format!("데이터 조회에 실패했습니다: {}", message)
            }
            SourceError::CursorInvalid { .. } => "조회 위치가 유효하지 않습니다".to_string(),
            SourceError::Unavailable { message } => {
                format!("로컬 저장소에 접근할 수 없습니다: {}", message)
            }
        }
    }
}

// =============================================================================
// TagError
// =============================================================================

/// Tag read/write errors.
#[derive(Debug, Clone, Error)]
pub enum TagError {
    /// No tag with the given name exists.
    #[error("Tag not found: {name}")]
    NotFound {
        /// The missing tag name.
        name: String,
    },

    /// The value does not parse for the tag's declared kind.
    #[error("Invalid value for tag '{name}': {message}")]
    InvalidValue {
        /// The target tag name.
        name: String,
        /// Error message.
        message: String,
    },

    /// The device rejected or failed the write.
    #[error("Write to tag '{name}' failed: {message}")]
    WriteFailed {
        /// The target tag name.
        name: String,
        /// Error message.
        message: String,
    },
}

impl TagError {
    /// Creates a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates an invalid-value error.
    pub fn invalid_value(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a write-failed error.
    pub fn write_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            TagError::NotFound { name } => format!("태그를 찾을 수 없습니다: {}", name),
            TagError::InvalidValue { name, .. } => {
                format!("태그 값이 유효하지 않습니다: {}", name)
            }
            TagError::WriteFailed { name, .. } => format!("태그 쓰기에 실패했습니다: {}", name),
        }
    }
}

// =============================================================================
// ControlError
// =============================================================================

/// Device control errors.
#[derive(Debug, Clone, Error)]
pub enum ControlError {
    /// The restart request was not accepted.
    #[error("Restart failed: {message}")]
    RestartFailed {
        /// Error message.
        message: String,
    },

    /// The firmware image could not be staged for installation.
    #[error("Firmware staging failed: {message}")]
    StageFailed {
        /// Error message.
        message: String,
    },
}

impl ControlError {
    /// Creates a restart-failed error.
    pub fn restart_failed(message: impl Into<String>) -> Self {
        Self::RestartFailed {
            message: message.into(),
        }
    }

    /// Creates a stage-failed error.
    pub fn stage_failed(message: impl Into<String>) -> Self {
        Self::StageFailed {
            message: message.into(),
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ControlError::RestartFailed { .. } => "장비 재시작에 실패했습니다".to_string(),
            ControlError::StageFailed { .. } => "펌웨어 적용 준비에 실패했습니다".to_string(),
        }
    }
}

// =============================================================================
// SettingsError
// =============================================================================

/// Persisted settings access errors.
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    /// The settings backing store could not be read.
    #[error("Settings read failed: {message}")]
    ReadFailed {
        /// Error message.
        message: String,
    },

    /// A setting could not be written back.
    #[error("Settings write failed for '{key}': {message}")]
    WriteFailed {
        /// The setting key.
        key: String,
        /// Error message.
        message: String,
    },

    /// The key is not in the table of known settings.
    #[error("Unknown setting key: {key}")]
    UnknownKey {
        /// The rejected key.
        key: String,
    },
}

impl SettingsError {
    /// Creates a read-failed error.
    pub fn read_failed(message: impl Into<String>) -> Self {
        Self::ReadFailed {
            message: message.into(),
        }
    }

    /// Creates a write-failed error.
    pub fn write_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown-key error.
    pub fn unknown_key(key: impl Into<String>) -> Self {
        Self::UnknownKey { key: key.into() }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            SettingsError::ReadFailed { .. } => "설정을 읽을 수 없습니다".to_string(),
            SettingsError::WriteFailed { key, .. } => {
                format!("설정 저장에 실패했습니다: {}", key)
            }
            SettingsError::UnknownKey { key } => format!("알 수 없는 설정 키입니다: {}", key),
        }
    }
}

// =============================================================================
// FirmwareError
// =============================================================================

/// Firmware retrieval errors, categorized for the FAILED reason reported
/// back to the platform.
#[derive(Debug, Clone, Error)]
pub enum FirmwareError {
    /// The server rejected the gateway's credentials.
    #[error("firmware download unauthorized (status {status})")]
    Auth {
        /// HTTP status code.
        status: u16,
    },

    /// The server was unreachable or the transfer broke.
    #[error("firmware download connection failed: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The device rejected the downloaded image.
    #[error("firmware rejected by device: {message}")]
    Device {
        /// Error message.
        message: String,
    },

    /// Anything else.
    #[error("firmware download failed: {message}")]
    Unknown {
        /// Error message.
        message: String,
    },
}

impl FirmwareError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a device-side error.
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Creates an unknown error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Failure category used in operation FAILED reasons.
    pub fn category(&self) -> &'static str {
        match self {
            FirmwareError::Auth { .. } => "auth",
            FirmwareError::Connection { .. } => "connection",
            FirmwareError::Device { .. } => "device",
            FirmwareError::Unknown { .. } => "unknown",
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FirmwareError::Connection { .. })
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            FirmwareError::Auth { .. } => "펌웨어 서버 인증에 실패했습니다".to_string(),
            FirmwareError::Connection { message } => {
                format!("펌웨어 다운로드 연결에 실패했습니다: {}", message)
            }
            FirmwareError::Device { message } => {
                format!("장비가 펌웨어를 거부했습니다: {}", message)
            }
            FirmwareError::Unknown { message } => {
                format!("펌웨어 다운로드에 실패했습니다: {}", message)
            }
        }
    }
}

// =============================================================================
// LinkError
// =============================================================================

/// Cloud transport and provisioning errors.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// Connection to the broker failed.
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message.
        message: String,
    },

    /// The operation timed out.
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// How long the operation waited.
        duration: Duration,
    },

    /// The link is not connected.
    #[error("Not connected to the platform")]
    NotConnected,

    /// A publish was not accepted.
    #[error("Publish to '{topic}' failed: {message}")]
    PublishFailed {
        /// Target topic.
        topic: String,
        /// Error message.
        message: String,
    },

    /// A subscription was not accepted.
    #[error("Subscribe to '{topic}' failed: {message}")]
    SubscribeFailed {
        /// Target topic.
        topic: String,
        /// Error message.
        message: String,
    },

    /// The broker rejected the session or a packet.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Error message.
        message: String,
    },

    /// The inbound channel closed; the event loop task ended.
    #[error("Link channel closed")]
    ChannelClosed,

    /// The provisioning exchange failed.
    #[error("Provisioning failed: {message}")]
    ProvisioningFailed {
        /// Error message.
        message: String,
    },

    /// Provisioning was cancelled by shutdown before completion.
    #[error("Provisioning cancelled")]
    Cancelled,
}

impl LinkError {
    /// Creates a connection-failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Creates a publish-failed error.
    pub fn publish_failed(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PublishFailed {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Creates a subscribe-failed error.
    pub fn subscribe_failed(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SubscribeFailed {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a provisioning-failed error.
    pub fn provisioning_failed(message: impl Into<String>) -> Self {
        Self::ProvisioningFailed {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::ConnectionFailed { .. }
            | LinkError::Timeout { .. }
            | LinkError::NotConnected
            | LinkError::PublishFailed { .. }
            | LinkError::SubscribeFailed { .. }
            | LinkError::ProvisioningFailed { .. } => true,
            LinkError::Protocol { .. } | LinkError::ChannelClosed | LinkError::Cancelled => false,
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            LinkError::ConnectionFailed { .. } => "클라우드 연결에 실패했습니다".to_string(),
            LinkError::Timeout { .. } => "클라우드 응답 시간이 초과되었습니다".to_string(),
            LinkError::NotConnected => "클라우드에 연결되어 있지 않습니다".to_string(),
            LinkError::PublishFailed { topic, .. } => {
                format!("메시지 전송에 실패했습니다 ({})", topic)
            }
            LinkError::SubscribeFailed { topic, .. } => {
                format!("구독에 실패했습니다 ({})", topic)
            }
            LinkError::Protocol { message } => {
                format!("플랫폼이 요청을 거부했습니다: {}", message)
            }
            LinkError::ChannelClosed => "수신 채널이 종료되었습니다".to_string(),
            LinkError::ProvisioningFailed { message } => {
                format!("장비 등록에 실패했습니다: {}", message)
            }
            LinkError::Cancelled => "장비 등록이 취소되었습니다".to_string(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result alias for the root error type.
pub type NimbusResult<T> = Result<T, NimbusError>;

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result alias for aggregation operations.
pub type AggregateResult<T> = Result<T, AggregateError>;

/// Result alias for historical store operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result alias for tag operations.
pub type TagResult<T> = Result<T, TagError>;

/// Result alias for device control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Result alias for persisted settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Result alias for firmware retrieval.
pub type FirmwareResult<T> = Result<T, FirmwareError>;

/// Result alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;

// =============================================================================
// Tests
// =============================================================================
