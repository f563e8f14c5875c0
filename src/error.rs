//! Unified error model for the query layer.
//! Engine and storage failures propagate to the caller unchanged; nothing in this crate
//! retries. Unresolvable encodings, deleted references and dangling joins are not errors
//! and never reach this enum.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameError {
    /// SQL or runtime failure reported by the embedded query engine.
    #[error("{code}: {message}")]
    Engine { code: String, message: String },
    /// Backend I/O failure while saving, loading or listing frame bytes.
    #[error("{code}: {message}")]
    Storage { code: String, message: String },
    /// Input that could not be parsed into a frame (file imports, serialized frames).
    #[error("{code}: {message}")]
    Parse { code: String, message: String },
    /// Remote connector failure (connect, fetch or push-down execution).
    #[error("{code}: {message}")]
    Connector { code: String, message: String },
    #[error("{code}: {message}")]
    Config { code: String, message: String },
    #[error("{code}: {message}")]
    Internal { code: String, message: String },
}

impl FrameError {
    pub fn code_str(&self) -> &str {
        match self {
            FrameError::Engine { code, .. }
            | FrameError::Storage { code, .. }
            | FrameError::Parse { code, .. }
            | FrameError::Connector { code, .. }
            | FrameError::Config { code, .. }
            | FrameError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FrameError::Engine { message, .. }
            | FrameError::Storage { message, .. }
            | FrameError::Parse { message, .. }
            | FrameError::Connector { message, .. }
            | FrameError::Config { message, .. }
            | FrameError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn engine<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { FrameError::Engine { code: code.into(), message: msg.into() } }
    pub fn storage<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { FrameError::Storage { code: code.into(), message: msg.into() } }
    pub fn parse<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { FrameError::Parse { code: code.into(), message: msg.into() } }
    pub fn connector<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { FrameError::Connector { code: code.into(), message: msg.into() } }
    pub fn config<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { FrameError::Config { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { FrameError::Internal { code: code.into(), message: msg.into() } }
}

pub type FrameResult<T> = Result<T, FrameError>;

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Storage { code: "storage_io".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(err: serde_json::Error) -> Self {
        FrameError::Parse { code: "invalid_json".into(), message: err.to_string() }
    }
}

impl From<polars::error::PolarsError> for FrameError {
    fn from(err: polars::error::PolarsError) -> Self {
        FrameError::Engine { code: "engine_error".into(), message: err.to_string() }
    }
}

impl From<anyhow::Error> for FrameError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless mapped explicitly at the call site
        FrameError::Internal { code: "internal".into(), message: err.to_string() }
    }
}
