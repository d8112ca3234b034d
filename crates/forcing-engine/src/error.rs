//! Error types for forcing assembly.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Broad class of a [`ForcingError`].
///
/// Input files that simply have not been produced upstream yet are not
/// errors at all; they surface as [`crate::FrameLookup::NotYetAvailable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Detected at initialization, never retried.
    Configuration,
    /// Decode/regrid/contract failures on data that exists. Fatal for the run.
    Processing,
}

/// Errors that can occur while assembling forcings.
#[derive(Error, Debug)]
pub enum ForcingError {
    /// Product key outside the supported enumeration.
    #[error("unknown forcing product key: {0}")]
    UnknownProductKey(u8),

    /// A downscaling option needs a static grid that is not on disk.
    #[error("{product}: {option} requires {path:?}, which was not found")]
    MissingAuxiliaryInput {
        product: String,
        option: String,
        path: PathBuf,
    },

    /// Structurally invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// The bracket resolver was asked something it cannot answer.
    #[error("{product}: malformed bracket request: {reason}")]
    MalformedRequest { product: String, reason: String },

    /// The resolver produced a bracket that does not surround the output time.
    #[error("{product}: output time {now} is outside bracket [{previous}, {next}]")]
    BracketViolation {
        product: String,
        now: DateTime<Utc>,
        previous: DateTime<Utc>,
        next: DateTime<Utc>,
    },

    /// An input file exists but could not be decoded.
    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// Projection onto the local subdomain failed.
    #[error("{product}: regrid failed: {reason}")]
    Regrid { product: String, reason: String },

    /// Interpolation was invoked with unmet preconditions.
    #[error("{product}: interpolation precondition violated: {reason}")]
    InterpolationPrecondition { product: String, reason: String },

    /// Downscaling or bias correction failed.
    #[error("{product}: post-processing failed: {reason}")]
    PostProcess { product: String, reason: String },

    /// A buffer does not have the shape the local subdomain requires.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Storage/IO error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForcingError {
    /// Which taxonomy class this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownProductKey(_)
            | Self::MissingAuxiliaryInput { .. }
            | Self::InvalidConfig(_)
            | Self::ConfigParse(_) => ErrorCategory::Configuration,
            Self::MalformedRequest { .. }
            | Self::BracketViolation { .. }
            | Self::Decode { .. }
            | Self::Regrid { .. }
            | Self::InterpolationPrecondition { .. }
            | Self::PostProcess { .. }
            | Self::ShapeMismatch { .. }
            | Self::Io(_) => ErrorCategory::Processing,
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a Regrid error.
    pub fn regrid(product: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Regrid {
            product: product.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for forcing engine operations.
pub type Result<T> = std::result::Result<T, ForcingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_category() {
        assert_eq!(
            ForcingError::UnknownProductKey(42).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ForcingError::invalid_config("bad").category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_processing_category() {
        let err = ForcingError::Decode {
            path: PathBuf::from("/data/gfs.f003"),
            reason: "truncated message".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Processing);
        assert_eq!(
            ForcingError::regrid("HRRR", "weights").category(),
            ErrorCategory::Processing
        );
    }

    #[test]
    fn test_display() {
        let err = ForcingError::UnknownProductKey(11);
        assert_eq!(err.to_string(), "unknown forcing product key: 11");
    }
}
