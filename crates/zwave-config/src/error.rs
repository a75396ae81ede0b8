use zwave_frame::ErrorCode;

/// Errors that can occur while loading device configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A file or directory could not be read, or broke a loader limit.
    #[error("failed to load config: {0}")]
    LoadFailed(String),

    /// An embedded schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// A document does not match its schema.
    #[error("{file} failed validation: {message}")]
    ValidationFailed { file: String, message: String },

    /// A document is not valid JSON.
    #[error("document is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Two device files claim the same manufacturer/product triple.
    #[error("{file} redefines device {key}")]
    Duplicate { file: String, key: String },
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::LoadFailed(_) => ErrorCode::Io,
            _ => ErrorCode::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
