//! Error types for runlink-core.

use thiserror::Error;

/// A core engine call that reported failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("core engine `{op}` failed: {detail}")]
pub struct EngineFault {
    pub op: &'static str,
    pub detail: String,
}

impl EngineFault {
    pub fn new(op: &'static str, detail: impl Into<String>) -> Self {
        Self {
            op,
            detail: detail.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RunlinkError {
    #[error("Core engine is not set up (session uninitialized or torn down)")]
    EngineNotReady,

    #[error("Core engine returned invalid run handle {code}")]
    EngineInit { code: i32 },

    #[error("Value for key `{key}` has unsupported type {found}")]
    InvalidValueType { key: String, found: &'static str },

    #[error("Run {handle} is already finished")]
    UseAfterFinish { handle: i32 },

    #[error("Keys must be non-empty")]
    EmptyKey,

    #[error("Invalid value {value:?} for setting `{key}`")]
    InvalidSetting { key: String, value: String },

    #[error("Default session is already installed")]
    AlreadyInstalled,

    #[error(transparent)]
    Engine(#[from] EngineFault),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RunlinkError>;
