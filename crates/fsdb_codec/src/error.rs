//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding a table file.
#[derive(Error, Debug)]
pub enum CodecError {
    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML text could not be parsed.
    #[error("TOML decoding failed: {0}")]
    TomlDecode(#[from] toml::de::Error),

    /// A record set could not be rendered as TOML.
    #[error("TOML encoding failed: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    /// Table file bytes are not valid UTF-8 where text is required.
    #[error("invalid UTF-8 in table file")]
    InvalidUtf8,

    /// The decoded document is not a mapping of record IDs to records.
    #[error("invalid table shape: {message}")]
    InvalidShape {
        /// Description of the structural error.
        message: String,
    },

    /// A value cannot be represented in the target format.
    #[error("unsupported value: {message}")]
    Unsupported {
        /// Description of the unsupported value.
        message: String,
    },
}

impl CodecError {
    /// Create an invalid shape error.
    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::InvalidShape {
            message: message.into(),
        }
    }

    /// Create an unsupported value error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}
